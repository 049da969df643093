//! PostgreSQL dialect.

use super::{quote_literal, AutoIncrementStrategy, Dialect, DEFAULT_VARCHAR_SIZE};
use crate::error::Result;
use crate::record::FieldType;
use crate::table::{ColumnMap, TableMap};

/// Longest identifier PostgreSQL stores; longer names are truncated.
const MAX_IDENTIFIER_BYTES: usize = 63;

/// PostgreSQL dialect.
///
/// Identifiers are folded to lower case before quoting, so mixed-case
/// field names map onto the names PostgreSQL stores unquoted.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    suffix: String,
}

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            suffix: String::new(),
        }
    }

    /// Sets the text appended to every CREATE TABLE.
    #[must_use]
    pub fn with_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    fn schema_predicate(schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.trim().is_empty() => {
                format!("n.nspname = {}", quote_literal(&schema.to_lowercase()))
            }
            _ => "n.nspname = current_schema()".to_string(),
        }
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn to_sql_type(&self, field_type: FieldType, max_size: usize, auto_increment: bool) -> String {
        match field_type {
            FieldType::Bool => "BOOLEAN".to_string(),
            FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::UInt8
            | FieldType::UInt16 => {
                if auto_increment {
                    "SERIAL".to_string()
                } else {
                    "INTEGER".to_string()
                }
            }
            FieldType::Int64 | FieldType::UInt32 | FieldType::UInt64 => {
                if auto_increment {
                    "BIGSERIAL".to_string()
                } else {
                    "BIGINT".to_string()
                }
            }
            FieldType::Float64 => "DOUBLE PRECISION".to_string(),
            FieldType::Float32 => "REAL".to_string(),
            FieldType::Bytes => "BYTEA".to_string(),
            FieldType::Timestamp => "TIMESTAMP WITH TIME ZONE".to_string(),
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

    // SERIAL types carry the sequence; no clause is needed.
    fn auto_increment_clause(&self) -> &'static str {
        ""
    }

    fn auto_increment_bind_value(&self) -> &'static str {
        "DEFAULT"
    }

    fn auto_increment_insert_suffix(&self, column: &ColumnMap) -> String {
        format!(" RETURNING {}", self.quote_field(&column.column_name))
    }

    fn auto_increment_strategy(&self) -> AutoIncrementStrategy {
        AutoIncrementStrategy::Returning
    }

    fn create_table_suffix(&self) -> Result<String> {
        Ok(self.suffix.clone())
    }

    fn truncate_clause(&self) -> &'static str {
        "TRUNCATE"
    }

    fn bind_var(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn quote_field(&self, name: &str) -> String {
        format!("\"{}\"", name.to_lowercase().replace('"', "\"\""))
    }

    fn index_exists_query(&self, table: &str, index: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT a.attname AS column_name \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE t.relkind = 'r' AND t.relname = {} AND i.relname = {} AND {} \
             ORDER BY array_position(ix.indkey::int2[], a.attnum){}",
            quote_literal(&table.to_lowercase()),
            quote_literal(&index.to_lowercase()),
            Self::schema_predicate(schema),
            self.query_suffix()
        ))
    }

    fn index_list_query(&self, table: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT i.relname AS index_name \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE t.relkind = 'r' AND t.relname = {} AND {} \
             AND NOT ix.indisprimary \
             AND NOT EXISTS (SELECT 1 FROM pg_constraint c WHERE c.conindid = ix.indexrelid) \
             ORDER BY i.relname{}",
            quote_literal(&table.to_lowercase()),
            Self::schema_predicate(schema),
            self.query_suffix()
        ))
    }

    fn drop_index(&self, table: &TableMap, index: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {}{}",
            self.quoted_table_for_query(table.schema_name.as_deref(), index),
            self.query_suffix()
        ))
    }

    fn build_index_name(&self, table: &str, index: &str) -> Result<String> {
        let name = if table.trim().is_empty() {
            index.to_lowercase()
        } else {
            format!("ix_{table}_{index}").to_lowercase()
        };
        Ok(truncate_identifier(name))
    }
}

// Mirrors the server, which cuts long names at a character boundary.
fn truncate_identifier(mut name: String) -> String {
    if name.len() > MAX_IDENTIFIER_BYTES {
        let mut end = MAX_IDENTIFIER_BYTES;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}
