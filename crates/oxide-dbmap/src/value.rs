//! SQL values and conversions between record fields and bind parameters.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// A value bound to a statement or read back from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Point in time, always carried in UTC.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Returns true for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reads the value as an integer, accepting integral text.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Failure converting a [`SqlValue`] into a Rust field type.
#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    /// The value had the wrong shape for the target type.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// Target type description.
        expected: &'static str,
        /// Kind of value that was found.
        found: &'static str,
    },

    /// An integer did not fit the target type.
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// The offending value.
        value: String,
        /// Target type name.
        target: &'static str,
    },

    /// Text could not be parsed as a timestamp.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The record has no field with this name.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

fn unexpected(expected: &'static str, found: &SqlValue) -> ConversionError {
    ConversionError::Unexpected {
        expected,
        found: found.kind(),
    }
}

/// Trait for types that can be bound as statement parameters.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(&self) -> SqlValue;
}

/// Trait for types that can be read back from a result column.
pub trait FromSqlValue: Sized {
    /// Converts a column value into `Self`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when the value does not fit.
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError>;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            // Dialects without a boolean type store 0/1.
            SqlValue::Int(n) => Ok(n != 0),
            other => Err(unexpected("bool", &other)),
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }
            }

            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
                    let n = value
                        .as_i64()
                        .ok_or_else(|| unexpected(stringify!($ty), &value))?;
                    <$ty>::try_from(n).map_err(|_| ConversionError::OutOfRange {
                        value: n.to_string(),
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for u64 {
    fn to_sql_value(&self) -> SqlValue {
        // Values above i64::MAX travel as text.
        i64::try_from(*self).map_or_else(|_| SqlValue::Text(self.to_string()), SqlValue::Int)
    }
}

impl FromSqlValue for u64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Int(n) => Self::try_from(n).map_err(|_| ConversionError::OutOfRange {
                value: n.to_string(),
                target: "u64",
            }),
            SqlValue::Text(ref s) => s.trim().parse().map_err(|_| ConversionError::OutOfRange {
                value: s.clone(),
                target: "u64",
            }),
            other => Err(unexpected("u64", &other)),
        }
    }
}

// Pointer-sized integers are stored through their 64-bit counterparts.
impl ToSqlValue for isize {
    fn to_sql_value(&self) -> SqlValue {
        match i64::try_from(*self) {
            Ok(n) => SqlValue::Int(n),
            Err(_) => SqlValue::Text(self.to_string()),
        }
    }
}

impl FromSqlValue for isize {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        let n = i64::from_sql_value(value)?;
        Self::try_from(n).map_err(|_| ConversionError::OutOfRange {
            value: n.to_string(),
            target: "isize",
        })
    }
}

impl ToSqlValue for usize {
    fn to_sql_value(&self) -> SqlValue {
        match u64::try_from(*self) {
            Ok(n) => n.to_sql_value(),
            Err(_) => SqlValue::Text(self.to_string()),
        }
    }
}

impl FromSqlValue for usize {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        let n = u64::from_sql_value(value)?;
        Self::try_from(n).map_err(|_| ConversionError::OutOfRange {
            value: n.to_string(),
            target: "usize",
        })
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(n) => Ok(n as Self),
            other => Err(unexpected("f64", &other)),
        }
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        f64::from_sql_value(value).map(|f| f as Self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text((*self).to_string())
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Int(n) => Ok(n.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            other => Err(unexpected("text", &other)),
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Blob(self.clone())
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(unexpected("blob", &other)),
        }
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Timestamp(*self)
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Timestamp(ts) => Ok(ts),
            SqlValue::Text(s) => parse_timestamp(&s),
            other => Err(unexpected("timestamp", &other)),
        }
    }
}

/// Parses the textual timestamp forms drivers hand back.
fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ConversionError> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ConversionError::InvalidTimestamp(text.to_string()))
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        self.as_ref()
            .map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_integer_widening_and_range() {
        assert_eq!(42i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(u8::from_sql_value(SqlValue::Int(200)), Ok(200));
        assert!(matches!(
            i8::from_sql_value(SqlValue::Int(300)),
            Err(ConversionError::OutOfRange { target: "i8", .. })
        ));
    }

    #[test]
    fn test_u64_above_i64_max_uses_text() {
        let big = u64::MAX;
        let value = big.to_sql_value();
        assert_eq!(value, SqlValue::Text(big.to_string()));
        assert_eq!(u64::from_sql_value(value), Ok(big));
    }

    #[test]
    fn test_pointer_sized_integers() {
        assert_eq!((-7isize).to_sql_value(), SqlValue::Int(-7));
        assert_eq!(isize::from_sql_value(SqlValue::Int(-7)), Ok(-7));
        assert_eq!(12usize.to_sql_value(), SqlValue::Int(12));
        assert_eq!(usize::from_sql_value(SqlValue::Int(12)), Ok(12));
        assert!(matches!(
            usize::from_sql_value(SqlValue::Int(-1)),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(usize::from_sql_value(SqlValue::Text("x".into())).is_err());
    }

    #[test]
    fn test_bool_from_integer() {
        assert_eq!(bool::from_sql_value(SqlValue::Int(1)), Ok(true));
        assert_eq!(bool::from_sql_value(SqlValue::Int(0)), Ok(false));
        assert!(bool::from_sql_value(SqlValue::Text("yes".into())).is_err());
    }

    #[test]
    fn test_option_null() {
        assert_eq!(None::<i64>.to_sql_value(), SqlValue::Null);
        assert_eq!(Option::<String>::from_sql_value(SqlValue::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_sql_value(SqlValue::Text("x".into())),
            Ok(Some("x".to_string()))
        );
    }

    #[test]
    fn test_timestamp_text_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        for text in [
            "2024-03-01T12:30:00Z",
            "2024-03-01T12:30:00+00:00",
            "2024-03-01 12:30:00+00:00",
            "2024-03-01 12:30:00",
        ] {
            assert_eq!(
                DateTime::<Utc>::from_sql_value(SqlValue::Text(text.into())),
                Ok(expected),
                "{text}"
            );
        }
        assert!(matches!(
            DateTime::<Utc>::from_sql_value(SqlValue::Text("yesterday".into())),
            Err(ConversionError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_float_from_integer() {
        assert_eq!(f64::from_sql_value(SqlValue::Int(3)), Ok(3.0));
    }
}
