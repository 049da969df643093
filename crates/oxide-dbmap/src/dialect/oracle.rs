//! Oracle dialect.

use super::{quote_literal, AutoIncrementStrategy, Dialect};
use crate::error::Result;
use crate::record::FieldType;
use crate::table::{ColumnMap, TableMap};

/// Oracle dialect.
///
/// Identifiers are folded to upper case before quoting. Autoincrement
/// columns are identity columns; the generated key comes back through a
/// RETURNING clause, which the executor must surface as a result row.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn owner_predicate(schema: Option<&str>) -> String {
        match schema {
            Some(schema) if !schema.trim().is_empty() => {
                format!("TABLE_OWNER = {}", quote_literal(&schema.to_uppercase()))
            }
            _ => "TABLE_OWNER = SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA')".to_string(),
        }
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn query_suffix(&self) -> &'static str {
        ""
    }

    fn to_sql_type(&self, field_type: FieldType, max_size: usize, auto_increment: bool) -> String {
        let base = match field_type {
            FieldType::Bool => "NUMBER(1)".to_string(),
            FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::UInt8
            | FieldType::UInt16 => "NUMBER(10)".to_string(),
            FieldType::Int64 | FieldType::UInt32 | FieldType::UInt64 => "NUMBER(19)".to_string(),
            FieldType::Float32 => "BINARY_FLOAT".to_string(),
            FieldType::Float64 => "BINARY_DOUBLE".to_string(),
            FieldType::Bytes => "BLOB".to_string(),
            FieldType::Timestamp => "TIMESTAMP WITH TIME ZONE".to_string(),
            FieldType::Text | FieldType::Children | FieldType::Other => {
                if max_size == 0 {
                    "CLOB".to_string()
                } else {
                    format!("VARCHAR2({max_size})")
                }
            }
        };
        if auto_increment {
            format!("{base} GENERATED BY DEFAULT AS IDENTITY")
        } else {
            base
        }
    }

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

    fn truncate_clause(&self) -> &'static str {
        "TRUNCATE TABLE"
    }

    fn bind_var(&self, index: usize) -> String {
        format!(":{}", index + 1)
    }

    fn quote_field(&self, name: &str) -> String {
        format!("\"{}\"", name.to_uppercase().replace('"', "\"\""))
    }

    fn index_exists_query(&self, table: &str, index: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT COLUMN_NAME FROM ALL_IND_COLUMNS \
             WHERE {} AND TABLE_NAME = {} AND INDEX_NAME = {} \
             ORDER BY COLUMN_POSITION",
            Self::owner_predicate(schema),
            quote_literal(&table.to_uppercase()),
            quote_literal(&index.to_uppercase()),
        ))
    }

    fn index_list_query(&self, table: &str, schema: Option<&str>) -> Result<String> {
        Ok(format!(
            "SELECT INDEX_NAME FROM ALL_INDEXES \
             WHERE {} AND TABLE_NAME = {} AND CONSTRAINT_INDEX = 'NO' \
             ORDER BY INDEX_NAME",
            Self::owner_predicate(schema),
            quote_literal(&table.to_uppercase()),
        ))
    }

    fn drop_index(&self, table: &TableMap, index: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {}",
            self.quoted_table_for_query(table.schema_name.as_deref(), index)
        ))
    }

    fn build_index_name(&self, _table: &str, index: &str) -> Result<String> {
        Ok(index.to_uppercase())
    }
}
