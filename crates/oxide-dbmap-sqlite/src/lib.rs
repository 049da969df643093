//! # oxide-dbmap-sqlite
//!
//! An [`Executor`] for `oxide-dbmap` running on a `sqlx` SQLite pool.
//!
//! ```rust,no_run
//! use oxide_dbmap::{DbMap, SqliteDialect};
//! use oxide_dbmap_sqlite::SqliteExecutor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::connect("sqlite://app.db").await?;
//! let map = DbMap::new(SqliteDialect::new(), executor);
//! map.create_tables_if_not_exists().await?;
//! # Ok(())
//! # }
//! ```

use oxide_dbmap::{ExecResult, Executor, Row, SqlValue};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Errors raised by [`SqliteExecutor`].
#[derive(Debug, thiserror::Error)]
pub enum SqliteExecutorError {
    /// The driver rejected a statement or connection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A result column could not be decoded.
    #[error("Cannot decode column '{column}': {source}")]
    Decode {
        /// Column name as reported by SQLite.
        column: String,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
}

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, SqliteExecutorError>;

/// Runs generated statements on a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for a connection URL such as `sqlite://app.db`.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Opens a private in-memory database.
    ///
    /// The pool holds a single connection, since every SQLite memory
    /// connection is a separate database.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the database cannot be opened.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_params<'q>(sql: &'q str, params: &'q [SqlValue]) -> SqliteQuery<'q> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Blob(v) => query.bind(v.as_slice()),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Decodes a value by its storage class.
fn decode_value(row: &SqliteRow, index: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "INTEGER" | "INT8" | "BIGINT" | "BOOLEAN" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, index).map_err(|source| SqliteExecutorError::Decode {
            column: column.name().to_string(),
            source,
        })?;
        columns.push(column.name().to_string());
        values.push(value);
    }
    Ok(Row::new(columns, values))
}

impl Executor for SqliteExecutor {
    type Error = SqliteExecutorError;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult> {
        let result = bind_params(sql, params).execute(&self.pool).await?;
        debug!(rows_affected = result.rows_affected(), "Statement executed");
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let rows = bind_params(sql, params).fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "Query returned");
        rows.iter().map(decode_row).collect()
    }
}
