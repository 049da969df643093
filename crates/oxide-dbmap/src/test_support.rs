//! Scripted executor for unit tests.

use std::sync::Mutex;

use thiserror::Error;

use crate::executor::{ExecResult, Executor, Row};
use crate::value::SqlValue;

#[derive(Debug, Error)]
#[error("scripted failure for `{0}`")]
pub struct MockError(pub String);

/// Records every statement and answers from a script.
///
/// Queries are answered by the first rule whose pattern occurs in the
/// statement; unmatched queries return no rows. Inserts report
/// increasing ids starting at 1.
#[derive(Debug, Default)]
pub struct MockExecutor {
    log: Mutex<Vec<(String, Vec<SqlValue>)>>,
    rules: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Mutex<Vec<String>>,
    next_id: Mutex<i64>,
    rows_affected: Mutex<u64>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            rows_affected: Mutex::new(1),
            ..Self::default()
        }
    }

    pub fn with_rows(self, pattern: &str, rows: Vec<Row>) -> Self {
        self.rules.lock().unwrap().push((pattern.to_string(), rows));
        self
    }

    pub fn failing_on(self, pattern: &str) -> Self {
        self.failures.lock().unwrap().push(pattern.to_string());
        self
    }

    pub fn reporting_rows_affected(self, count: u64) -> Self {
        *self.rows_affected.lock().unwrap() = count;
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[SqlValue]) -> Result<(), MockError> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        let failures = self.failures.lock().unwrap();
        if failures.iter().any(|p| sql.contains(p.as_str())) {
            return Err(MockError(sql.to_string()));
        }
        Ok(())
    }
}

/// Builds a row of `(column, value)` pairs.
pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| (*c).to_string()).collect(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}

/// Builds single-column rows of text values.
pub fn text_rows(column: &str, values: &[&str]) -> Vec<Row> {
    values
        .iter()
        .map(|v| row(&[(column, SqlValue::Text((*v).to_string()))]))
        .collect()
}

impl Executor for MockExecutor {
    type Error = MockError;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult, MockError> {
        self.record(sql, params)?;
        let last_insert_id = if sql.starts_with("INSERT") {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Some(*next)
        } else {
            None
        };
        Ok(ExecResult {
            rows_affected: *self.rows_affected.lock().unwrap(),
            last_insert_id,
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, MockError> {
        self.record(sql, params)?;
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}
