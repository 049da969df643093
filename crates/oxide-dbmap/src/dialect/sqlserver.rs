//! Microsoft SQL Server dialect.

use super::{unsupported, Dialect};
use crate::error::Result;
use crate::record::FieldType;
use crate::table::TableMap;

/// SQL Server dialect.
///
/// Set `version` to `"2005"` to use the legacy `DATETIME` type and a
/// bounded default `NVARCHAR` length.
#[derive(Debug, Clone, Default)]
pub struct SqlServerDialect {
    /// Server version; only `"2005"` changes behavior.
    pub version: String,
}

impl SqlServerDialect {
    /// Creates a dialect for current SQL Server versions.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: String::new(),
        }
    }

    /// Creates a dialect for a specific server version.
    #[must_use]
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    fn is_legacy(&self) -> bool {
        self.version == "2005"
    }

    fn object_name(&self, schema: Option<&str>, table: &str) -> String {
        let name = self.quoted_table_for_query(schema, table);
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn to_sql_type(&self, field_type: FieldType, max_size: usize, _auto_increment: bool) -> String {
        match field_type {
            FieldType::Bool => "BIT".to_string(),
            FieldType::UInt8 => "TINYINT".to_string(),
            FieldType::Int8 | FieldType::Int16 => "SMALLINT".to_string(),
            FieldType::UInt16 | FieldType::Int32 => "INT".to_string(),
            FieldType::UInt32 | FieldType::Int64 => "BIGINT".to_string(),
            FieldType::UInt64 => "NUMERIC(20,0)".to_string(),
            FieldType::Float32 => "FLOAT(24)".to_string(),
            FieldType::Float64 => "FLOAT(53)".to_string(),
            FieldType::Bytes => {
                if max_size == 0 {
                    "VARBINARY(MAX)".to_string()
                } else {
                    format!("VARBINARY({max_size})")
                }
            }
            FieldType::Timestamp => {
                if self.is_legacy() {
                    "DATETIME".to_string()
                } else {
                    "DATETIME2".to_string()
                }
            }
            FieldType::Text | FieldType::Children | FieldType::Other => match max_size {
                0 if self.is_legacy() => "NVARCHAR(255)".to_string(),
                0 => "NVARCHAR(MAX)".to_string(),
                n => format!("NVARCHAR({n})"),
            },
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "IDENTITY(0,1)"
    }

    fn auto_increment_bind_value(&self) -> &'static str {
        ""
    }

    fn truncate_clause(&self) -> &'static str {
        "TRUNCATE TABLE"
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quote_field(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn if_schema_not_exists(&self, command: &str, schema: &str) -> String {
        format!(
            "IF SCHEMA_ID(N'{}') IS NULL {command}",
            schema.replace('\'', "''")
        )
    }

    fn if_table_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        format!(
            "IF OBJECT_ID({}) IS NOT NULL {command}",
            self.object_name(schema, table)
        )
    }

    fn if_table_not_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        format!(
            "IF OBJECT_ID({}) IS NULL {command}",
            self.object_name(schema, table)
        )
    }

    fn index_exists_query(
        &self,
        _table: &str,
        _index: &str,
        _schema: Option<&str>,
    ) -> Result<String> {
        Err(unsupported(self.name(), "index introspection"))
    }

    fn index_list_query(&self, _table: &str, _schema: Option<&str>) -> Result<String> {
        Err(unsupported(self.name(), "index listing"))
    }

    fn drop_index(&self, table: &TableMap, index: &str) -> Result<String> {
        Ok(format!(
            "DROP INDEX {} ON {}{}",
            self.quote_field(index),
            table.quoted_name(self),
            self.query_suffix()
        ))
    }

    fn build_index_name(&self, _table: &str, index: &str) -> Result<String> {
        Ok(index.to_string())
    }
}
