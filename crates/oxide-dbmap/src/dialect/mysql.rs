//! MySQL dialect.

use super::{quote_literal, Dialect, DEFAULT_VARCHAR_SIZE};
use crate::error::{DbMapError, Result};
use crate::record::FieldType;
use crate::table::TableMap;

/// MySQL dialect.
///
/// `engine` (e.g. `InnoDB`) and `encoding` (e.g. `UTF8`) are both
/// required before any table can be created.
#[derive(Debug, Clone, Default)]
pub struct MySqlDialect {
    /// Storage engine for created tables.
    pub engine: String,
    /// Character set for created tables.
    pub encoding: String,
}

impl MySqlDialect {
    /// Creates a MySQL dialect with the given engine and encoding.
    #[must_use]
    pub fn new(engine: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            encoding: encoding.into(),
        }
    }

    fn schema_predicate(schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.trim().is_empty() => {
                format!("TABLE_SCHEMA = {}", quote_literal(schema))
            }
            _ => "TABLE_SCHEMA = DATABASE()".to_string(),
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn to_sql_type(&self, field_type: FieldType, max_size: usize, _auto_increment: bool) -> String {
        let ty = match field_type {
            FieldType::Bool => "BOOLEAN",
            FieldType::Int8 => "TINYINT",
            FieldType::UInt8 => "TINYINT UNSIGNED",
            FieldType::Int16 => "SMALLINT",
            FieldType::UInt16 => "SMALLINT UNSIGNED",
            FieldType::Int32 => "INT",
            FieldType::UInt32 => "INT UNSIGNED",
            FieldType::Int64 => "BIGINT",
            FieldType::UInt64 => "BIGINT UNSIGNED",
            FieldType::Float32 | FieldType::Float64 => "DOUBLE",
            FieldType::Bytes => "MEDIUMBLOB",
            FieldType::Timestamp => "DATETIME",
            FieldType::Text | FieldType::Children | FieldType::Other => {
                let size = if max_size == 0 {
                    DEFAULT_VARCHAR_SIZE
                } else {
                    max_size
                };
                return format!("VARCHAR({size})");
            }
        };
        ty.to_string()
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn auto_increment_bind_value(&self) -> &'static str {
        "NULL"
    }

    fn create_table_suffix(&self) -> Result<String> {
        let mut missing = Vec::new();
        if self.engine.trim().is_empty() {
            missing.push("engine");
        }
        if self.encoding.trim().is_empty() {
            missing.push("encoding");
        }
        if !missing.is_empty() {
            return Err(DbMapError::config(
                "mysql dialect",
                format!("undefined {}", missing.join(", ")),
            ));
        }
        Ok(format!(" ENGINE={} CHARSET={}", self.engine, self.encoding))
    }

    fn truncate_clause(&self) -> &'static str {
        "TRUNCATE"
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_field(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn index_exists_query(&self, table: &str, index: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.STATISTICS \
             WHERE {} AND TABLE_NAME = {} AND INDEX_NAME = {} \
             ORDER BY SEQ_IN_INDEX{}",
            Self::schema_predicate(schema),
            quote_literal(table),
            quote_literal(index),
            self.query_suffix()
        ))
    }

    // MySQL reports every unique index as a UNIQUE constraint, so
    // constraint tables cannot tell inline column constraints apart from
    // created indexes. An inline `UNIQUE` is a single-column unique index
    // named after its column.
    fn index_list_query(&self, table: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT INDEX_NAME FROM INFORMATION_SCHEMA.STATISTICS \
             WHERE {} AND TABLE_NAME = {} AND INDEX_NAME <> 'PRIMARY' \
             GROUP BY INDEX_NAME \
             HAVING NOT (MAX(NON_UNIQUE) = 0 AND COUNT(*) = 1 AND MAX(COLUMN_NAME) = INDEX_NAME) \
             ORDER BY INDEX_NAME{}",
            Self::schema_predicate(schema),
            quote_literal(table),
            self.query_suffix()
        ))
    }

    fn drop_index(&self, table: &TableMap, index: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {} ON {}{}",
            self.quote_field(index),
            table.quoted_name(self),
            self.query_suffix()
        ))
    }

    // Index names are scoped to their table.
    fn build_index_name(&self, _table: &str, index: &str) -> Result<String> {
        Ok(index.to_string())
    }
}
