//! The statement execution contract the engine is driven through.
//!
//! The engine never opens connections, pools them or demarcates
//! transactions. An [`Executor`] implementation supplies those and
//! runs the SQL this crate generates.

use std::future::Future;

use crate::value::SqlValue;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Key generated by the last insert, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// One result row, with column names as reported by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row from parallel column and value lists.
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value at a result position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Value of a column, matched case-insensitively.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Consumes the row into `(column, value)` pairs.
    pub fn into_pairs(self) -> impl Iterator<Item = (String, SqlValue)> {
        self.columns.into_iter().zip(self.values)
    }
}

/// Runs statements against a live database.
pub trait Executor: Send + Sync {
    /// Driver error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs a statement that returns no rows.
    fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<ExecResult, Self::Error>> + Send;

    /// Runs a statement and collects its rows.
    fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send;
}
