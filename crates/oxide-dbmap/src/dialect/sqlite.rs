//! SQLite dialect.

use super::{quote_literal, Dialect, DEFAULT_VARCHAR_SIZE};
use crate::error::Result;
use crate::record::FieldType;

/// SQLite dialect.
///
/// SQLite has no schemas; a table's schema name is ignored.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect {
    suffix: String,
}

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            suffix: String::new(),
        }
    }

    /// Sets the text appended to every CREATE TABLE, e.g. `" STRICT"`.
    #[must_use]
    pub fn with_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn to_sql_type(&self, field_type: FieldType, max_size: usize, _auto_increment: bool) -> String {
        match field_type {
            FieldType::Bool
            | FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt8
            | FieldType::UInt16
            | FieldType::UInt32
            | FieldType::UInt64 => "INTEGER".to_string(),
            FieldType::Float32 | FieldType::Float64 => "REAL".to_string(),
            FieldType::Bytes => "BLOB".to_string(),
            FieldType::Timestamp => "DATETIME".to_string(),
            FieldType::Text | FieldType::Children | FieldType::Other => {
                let size = if max_size == 0 {
                    DEFAULT_VARCHAR_SIZE
                } else {
                    max_size
                };
                format!("VARCHAR({size})")
            }
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn auto_increment_declares_primary_key(&self) -> bool {
        true
    }

    fn auto_increment_bind_value(&self) -> &'static str {
        "NULL"
    }

    fn create_table_suffix(&self) -> Result<String> {
        Ok(self.suffix.clone())
    }

    // SQLite has no TRUNCATE; an unqualified DELETE takes the same fast path.
    fn truncate_clause(&self) -> &'static str {
        "DELETE FROM"
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_field(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn quoted_table_for_query(&self, _schema: Option<&str>, table: &str) -> String {
        self.quote_field(table)
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    fn index_exists_query(
        &self,
        _table: &str,
        index: &str,
        _schema: Option<&str>,
    ) -> Result<String> {
        Ok(format!(
            "SELECT name FROM pragma_index_info({}) ORDER BY seqno{}",
            quote_literal(index),
            self.query_suffix()
        ))
    }

    fn index_list_query(&self, table: &str, _schema: Option<&str>) -> Result<String> {
        // Automatic indexes behind PRIMARY KEY and UNIQUE have no SQL text.
        Ok(format!(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = {} \
             AND sql IS NOT NULL ORDER BY name{}",
            quote_literal(table),
            self.query_suffix()
        ))
    }

    // Index names are global to the database file.
    fn build_index_name(&self, table: &str, index: &str) -> Result<String> {
        Ok(format!("ix_{table}_{index}"))
    }
}
