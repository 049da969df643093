//! Per-database SQL syntax.
//!
//! Each supported database implements [`Dialect`]. Shared code only
//! ever calls through the trait; the one place that maps a dialect name
//! to an implementation is [`DialectConfig`](crate::DialectConfig).
//!
//! Methods that a database cannot support return
//! [`DbMapError::Unsupported`] instead of guessing, since a wrong answer
//! from an introspection query would mislead the schema reconciler.

mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use std::fmt;

use crate::error::{DbMapError, Result};
use crate::record::FieldType;
use crate::table::{ColumnMap, TableMap};

/// How the key assigned to an autoincrement column is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIncrementStrategy {
    /// The executor reports the generated id alongside the row count.
    LastInsertId,
    /// The INSERT carries a RETURNING suffix and yields the key as a row.
    Returning,
}

/// Syntax differences between SQL databases.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Terminator appended to generated statements.
    fn query_suffix(&self) -> &'static str {
        ";"
    }

    /// Column type for a field.
    ///
    /// `max_size` of 0 means the dialect default.
    fn to_sql_type(&self, field_type: FieldType, max_size: usize, auto_increment: bool) -> String;

    /// Text appended to an autoincrement column definition.
    fn auto_increment_clause(&self) -> &'static str;

    /// Whether the autoincrement clause is only legal on an inline
    /// `PRIMARY KEY` column, replacing the table-level key clause.
    fn auto_increment_declares_primary_key(&self) -> bool {
        false
    }

    /// Placeholder bound to the autoincrement column in an INSERT.
    ///
    /// Empty means the column is left out of the statement.
    fn auto_increment_bind_value(&self) -> &'static str;

    /// Text appended to an INSERT with an autoincrement column.
    fn auto_increment_insert_suffix(&self, column: &ColumnMap) -> String {
        let _ = column;
        String::new()
    }

    /// How the generated key is retrieved after an INSERT.
    fn auto_increment_strategy(&self) -> AutoIncrementStrategy {
        AutoIncrementStrategy::LastInsertId
    }

    /// Options appended after the column list of CREATE TABLE.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when required options are missing.
    fn create_table_suffix(&self) -> Result<String> {
        Ok(String::new())
    }

    /// Statement prefix used to empty a table.
    fn truncate_clause(&self) -> &'static str;

    /// Placeholder for the zero-based parameter `index`.
    fn bind_var(&self, index: usize) -> String;

    /// Quotes an identifier.
    fn quote_field(&self, name: &str) -> String;

    /// Quotes a table name, qualified by its schema when there is one.
    fn quoted_table_for_query(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.trim().is_empty() => {
                format!("{}.{}", self.quote_field(schema), self.quote_field(table))
            }
            _ => self.quote_field(table),
        }
    }

    /// Whether CREATE SCHEMA is meaningful for this database.
    fn supports_schemas(&self) -> bool {
        true
    }

    /// Guards a CREATE SCHEMA command.
    fn if_schema_not_exists(&self, command: &str, schema: &str) -> String {
        let _ = schema;
        format!("{command} IF NOT EXISTS")
    }

    /// Guards a DROP TABLE command.
    fn if_table_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        let _ = (schema, table);
        format!("{command} IF EXISTS")
    }

    /// Guards a CREATE TABLE command.
    fn if_table_not_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        let _ = (schema, table);
        format!("{command} IF NOT EXISTS")
    }

    /// Query returning one row per indexed column, ordered by position,
    /// when the canonical index `index` exists on `table`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Unsupported`] when the database cannot be
    /// introspected.
    fn index_exists_query(&self, table: &str, index: &str, schema: Option<&str>) -> Result<String>;

    /// Query returning the names of the secondary indexes on `table`.
    ///
    /// Indexes backing primary-key or unique constraints are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Unsupported`] when the database cannot be
    /// introspected.
    fn index_list_query(&self, table: &str, schema: Option<&str>) -> Result<String>;

    /// DROP INDEX statement for the canonical index name `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Unsupported`] when the database cannot drop
    /// indexes this way.
    fn drop_index(&self, table: &TableMap, index: &str) -> Result<String> {
        let _ = table;
        Ok(format!(
            "DROP INDEX {}{}",
            self.quote_field(index),
            self.query_suffix()
        ))
    }

    /// Canonical name under which the declared index `index` is created.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Unsupported`] when the database has no
    /// naming convention for indexes.
    fn build_index_name(&self, table: &str, index: &str) -> Result<String>;
}

/// Quotes a string literal for inline use in introspection queries.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Default `varchar` length when a field has no size hint.
pub(crate) const DEFAULT_VARCHAR_SIZE: usize = 255;

pub(crate) const fn unsupported(dialect: &'static str, operation: &'static str) -> DbMapError {
    DbMapError::Unsupported { dialect, operation }
}
