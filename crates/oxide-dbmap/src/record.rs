//! The record contract implemented by `#[derive(Record)]`.
//!
//! A record type describes its fields once, as a list of [`FieldDef`]s
//! carrying the raw annotation strings. The tag parser and the table
//! model builder turn that list into a [`TableMap`](crate::TableMap);
//! the orchestrator then reads and writes field values by name.
//!
//! [`DynRecord`] and [`ChildCollection`] are the object-safe views used
//! to walk parent/child graphs whose record types are only known at
//! runtime.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::error::BoxError;
use crate::value::{ConversionError, FromSqlValue, SqlValue};

/// Classification of a field's Rust type, used to pick a column type.
///
/// `Option<T>` fields are classified as `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Bytes,
    Timestamp,
    /// A `Vec` of child records backing a relation.
    Children,
    /// Any other type; mapped to the dialect's default string type.
    Other,
}

/// Identity of a record type, comparable at runtime.
#[derive(Clone, Copy)]
pub struct RecordRef {
    type_id: fn() -> TypeId,
    type_name: &'static str,
}

impl RecordRef {
    /// Returns the reference for record type `T`.
    #[must_use]
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>,
            type_name: T::type_name(),
        }
    }

    /// The runtime type identity.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// The record type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordRef").field(&self.type_name).finish()
    }
}

impl PartialEq for RecordRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

/// One struct field as declared, before its tags are interpreted.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Struct field name.
    pub name: &'static str,
    /// Classified Rust type.
    pub field_type: FieldType,
    /// Raw annotations as `(namespace, tag)` pairs, e.g. `("db", "name:id")`.
    pub tags: &'static [(&'static str, &'static str)],
    /// Child record type for relation fields.
    pub child: Option<RecordRef>,
}

impl FieldDef {
    /// A field with no annotations.
    #[must_use]
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            tags: &[],
            child: None,
        }
    }

    /// Attaches raw annotations.
    #[must_use]
    pub const fn with_tags(mut self, tags: &'static [(&'static str, &'static str)]) -> Self {
        self.tags = tags;
        self
    }

    /// Marks the field as holding children of the given type.
    #[must_use]
    pub const fn with_child(mut self, child: RecordRef) -> Self {
        self.child = Some(child);
        self
    }
}

/// Lifecycle points at which a record may run custom logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    PreInsert,
    PostInsert,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
    PostGet,
}

impl Hook {
    /// Hook name as used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreInsert => "pre_insert",
            Self::PostInsert => "post_insert",
            Self::PreUpdate => "pre_update",
            Self::PostUpdate => "post_update",
            Self::PreDelete => "pre_delete",
            Self::PostDelete => "post_delete",
            Self::PostGet => "post_get",
        }
    }
}

/// Outcome of a lifecycle hook.
pub type HookResult = std::result::Result<(), BoxError>;

/// Optional lifecycle callbacks.
///
/// Enabled on a derived record with `#[record(hooks)]`; every method
/// defaults to a no-op. An error from a `pre_*` hook aborts the
/// operation before any SQL runs.
pub trait RecordHooks {
    fn pre_insert(&mut self) -> HookResult {
        Ok(())
    }

    fn post_insert(&mut self) -> HookResult {
        Ok(())
    }

    fn pre_update(&mut self) -> HookResult {
        Ok(())
    }

    fn post_update(&mut self) -> HookResult {
        Ok(())
    }

    fn pre_delete(&mut self) -> HookResult {
        Ok(())
    }

    fn post_delete(&mut self) -> HookResult {
        Ok(())
    }

    fn post_get(&mut self) -> HookResult {
        Ok(())
    }

    /// Routes a [`Hook`] to the matching method.
    fn dispatch(&mut self, hook: Hook) -> HookResult {
        match hook {
            Hook::PreInsert => self.pre_insert(),
            Hook::PostInsert => self.post_insert(),
            Hook::PreUpdate => self.pre_update(),
            Hook::PostUpdate => self.post_update(),
            Hook::PreDelete => self.pre_delete(),
            Hook::PostDelete => self.post_delete(),
            Hook::PostGet => self.post_get(),
        }
    }
}

/// Column values keyed by field name, used to build records from rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: HashMap<String, SqlValue>,
}

impl FieldValues {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value for a field.
    pub fn insert(&mut self, field: impl Into<String>, value: SqlValue) {
        self.values.insert(field.into(), value);
    }

    /// Removes a field's value and converts it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] when the value does not fit `T`.
    pub fn take_as<T: FromSqlValue>(&mut self, field: &str) -> Result<Option<T>, ConversionError> {
        self.values
            .remove(field)
            .map(T::from_sql_value)
            .transpose()
    }

    /// Number of values held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no values are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for FieldValues {
    type Item = (String, SqlValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// A struct persisted as one table row.
///
/// Implemented by `#[derive(Record)]`; see the derive crate for the
/// attribute syntax. Fields missing from a result row keep their
/// `Default` value.
pub trait Record: Default + Send + Sync + 'static {
    /// Struct name, used as the default table name.
    fn type_name() -> &'static str;

    /// All fields in declaration order, including ignored ones.
    fn field_defs() -> Vec<FieldDef>;

    /// Current value of a persisted field, `None` for unknown names.
    fn field_value(&self, field: &str) -> Option<SqlValue>;

    /// Assigns a persisted field from a column value.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::UnknownField`] for names that are not
    /// persisted fields, or the conversion failure.
    fn set_field(&mut self, field: &str, value: SqlValue) -> Result<(), ConversionError>;

    /// Relation fields and their current children.
    fn relations(&self) -> Vec<(&'static str, &dyn ChildCollection)> {
        Vec::new()
    }

    /// Mutable access to relation fields.
    fn relations_mut(&mut self) -> Vec<(&'static str, &mut dyn ChildCollection)> {
        Vec::new()
    }

    /// Runs a lifecycle hook; a no-op unless hooks are enabled.
    ///
    /// # Errors
    ///
    /// Returns whatever the hook returns.
    fn run_hook(&mut self, hook: Hook) -> HookResult {
        let _ = hook;
        Ok(())
    }

    /// Builds a record from column values keyed by field name.
    ///
    /// # Errors
    ///
    /// Returns the first field conversion failure as `(field, error)`.
    fn from_values(values: FieldValues) -> Result<Self, (String, ConversionError)> {
        let mut record = Self::default();
        for (field, value) in values {
            record
                .set_field(&field, value)
                .map_err(|err| (field.clone(), err))?;
        }
        Ok(record)
    }
}

/// Object-safe view of a [`Record`].
pub trait DynRecord: Send + Sync {
    /// Identity of the concrete record type.
    fn record_ref(&self) -> RecordRef;

    /// See [`Record::field_value`].
    fn value_of(&self, field: &str) -> Option<SqlValue>;

    /// See [`Record::set_field`].
    ///
    /// # Errors
    ///
    /// Returns the conversion failure.
    fn assign(&mut self, field: &str, value: SqlValue) -> Result<(), ConversionError>;

    /// See [`Record::relations`].
    fn child_relations(&self) -> Vec<(&'static str, &dyn ChildCollection)>;

    /// See [`Record::relations_mut`].
    fn child_relations_mut(&mut self) -> Vec<(&'static str, &mut dyn ChildCollection)>;

    /// See [`Record::run_hook`].
    ///
    /// # Errors
    ///
    /// Returns whatever the hook returns.
    fn hook(&mut self, hook: Hook) -> HookResult;
}

impl<T: Record> DynRecord for T {
    fn record_ref(&self) -> RecordRef {
        RecordRef::of::<T>()
    }

    fn value_of(&self, field: &str) -> Option<SqlValue> {
        self.field_value(field)
    }

    fn assign(&mut self, field: &str, value: SqlValue) -> Result<(), ConversionError> {
        self.set_field(field, value)
    }

    fn child_relations(&self) -> Vec<(&'static str, &dyn ChildCollection)> {
        self.relations()
    }

    fn child_relations_mut(&mut self) -> Vec<(&'static str, &mut dyn ChildCollection)> {
        self.relations_mut()
    }

    fn hook(&mut self, hook: Hook) -> HookResult {
        self.run_hook(hook)
    }
}

/// Type-erased collection of child records held by a relation field.
pub trait ChildCollection: Send + Sync {
    /// Identity of the element type.
    fn child_ref(&self) -> RecordRef;

    /// Number of children.
    fn len(&self) -> usize;

    /// Returns true when there are no children.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child at `index`.
    fn child(&self, index: usize) -> Option<&dyn DynRecord>;

    /// Mutable child at `index`.
    fn child_mut(&mut self, index: usize) -> Option<&mut dyn DynRecord>;

    /// Removes every child.
    fn clear(&mut self);

    /// Builds a child from column values and appends it.
    ///
    /// # Errors
    ///
    /// Returns the first field conversion failure as `(field, error)`.
    fn push_values(&mut self, values: FieldValues) -> Result<(), (String, ConversionError)>;
}

impl<T: Record> ChildCollection for Vec<T> {
    fn child_ref(&self) -> RecordRef {
        RecordRef::of::<T>()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn child(&self, index: usize) -> Option<&dyn DynRecord> {
        self.get(index).map(|child| child as &dyn DynRecord)
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut dyn DynRecord> {
        self.get_mut(index).map(|child| child as &mut dyn DynRecord)
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn push_values(&mut self, values: FieldValues) -> Result<(), (String, ConversionError)> {
        self.push(T::from_values(values)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ToSqlValue;

    #[derive(Debug, Default, PartialEq)]
    struct Line {
        id: i64,
        label: String,
    }

    impl Record for Line {
        fn type_name() -> &'static str {
            "Line"
        }

        fn field_defs() -> Vec<FieldDef> {
            vec![
                FieldDef::new("id", FieldType::Int64).with_tags(&[("db", "primarykey")]),
                FieldDef::new("label", FieldType::Text),
            ]
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "id" => Some(self.id.to_sql_value()),
                "label" => Some(self.label.to_sql_value()),
                _ => None,
            }
        }

        fn set_field(&mut self, field: &str, value: SqlValue) -> Result<(), ConversionError> {
            match field {
                "id" => self.id = i64::from_sql_value(value)?,
                "label" => self.label = String::from_sql_value(value)?,
                other => return Err(ConversionError::UnknownField(other.to_string())),
            }
            Ok(())
        }
    }

    #[test]
    fn test_from_values_keeps_defaults_for_missing_fields() {
        let mut values = FieldValues::new();
        values.insert("label", SqlValue::Text("a".into()));
        let line = Line::from_values(values).unwrap();
        assert_eq!(
            line,
            Line {
                id: 0,
                label: "a".into()
            }
        );
    }

    #[test]
    fn test_from_values_reports_field() {
        let mut values = FieldValues::new();
        values.insert("id", SqlValue::Blob(vec![1]));
        let (field, err) = Line::from_values(values).unwrap_err();
        assert_eq!(field, "id");
        assert!(matches!(err, ConversionError::Unexpected { .. }));
    }

    #[test]
    fn test_child_collection_push_and_access() {
        let mut lines: Vec<Line> = Vec::new();
        let collection: &mut dyn ChildCollection = &mut lines;
        assert_eq!(collection.child_ref(), RecordRef::of::<Line>());

        let mut values = FieldValues::new();
        values.insert("id", SqlValue::Int(3));
        collection.push_values(values).unwrap();
        assert_eq!(collection.len(), 1);

        let child = collection.child_mut(0).unwrap();
        child.assign("label", SqlValue::Text("b".into())).unwrap();
        assert_eq!(child.value_of("id"), Some(SqlValue::Int(3)));
        assert_eq!(lines[0].label, "b");
    }
}
