//! Error types for the mapping engine.

use thiserror::Error;

use crate::value::ConversionError;

/// Boxed error produced by an executor or a lifecycle hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while mapping records, generating SQL or running
/// statements.
#[derive(Debug, Error)]
pub enum DbMapError {
    /// Invalid mapping metadata detected while building a table map.
    #[error("configuration error on {table}: {message}")]
    Config {
        /// Table (or record type) being configured.
        table: String,
        /// What is wrong with it.
        message: String,
    },

    /// A field annotation could not be parsed.
    #[error("invalid tag on field {field}: {message}")]
    InvalidTag {
        /// Struct field carrying the tag.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A relation names a child record type that was never registered.
    #[error("relation {field} on {table} targets unregistered type {child}")]
    UnresolvedRelation {
        /// Parent table.
        table: String,
        /// Relation field on the parent.
        field: String,
        /// Child record type name.
        child: String,
    },

    /// A key-based statement was requested for a table without a primary key.
    #[error("table {0} has no primary key")]
    NoPrimaryKey(String),

    /// An UPDATE was requested for a table whose columns are all keys.
    #[error("table {0} has no updatable columns")]
    NoUpdatableColumns(String),

    /// The record type has not been registered with the map.
    #[error("record type {0} is not registered")]
    NotRegistered(&'static str),

    /// The dialect cannot perform the requested operation.
    #[error("{operation} is not supported by the {dialect} dialect")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The executor rejected a statement.
    #[error("failed to execute `{sql}`: {source}")]
    Execution {
        /// Statement that was attempted.
        sql: String,
        /// Error reported by the executor.
        #[source]
        source: BoxError,
    },

    /// An autoincrement insert did not report the generated key.
    #[error("no generated key returned for `{0}`")]
    MissingGeneratedKey(String),

    /// A value read from the database did not fit the record field.
    #[error("cannot convert column {column}: {source}")]
    Conversion {
        /// Column or field that failed.
        column: String,
        /// Underlying conversion failure.
        #[source]
        source: ConversionError,
    },

    /// A lifecycle hook aborted the operation.
    #[error("{hook} hook failed on {record}: {source}")]
    Hook {
        /// Hook name.
        hook: &'static str,
        /// Record type name.
        record: &'static str,
        /// Error returned by the hook.
        #[source]
        source: BoxError,
    },
}

impl DbMapError {
    pub(crate) fn config(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            table: table.into(),
            message: message.into(),
        }
    }

    pub(crate) fn execution<E>(sql: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Execution {
            sql: sql.to_string(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, DbMapError>;
