//! Index reconciliation against a live schema.
//!
//! The declared indexes of a table map are compared with what the
//! database reports through the dialect's introspection queries.
//! Identity is by canonical index name: a live index with a declared
//! name but different columns is dropped and recreated, a live index
//! nobody declares is dropped, and a missing one is created. All drops
//! run before any create so that renames cannot collide.

use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::executor::{Executor, Row};
use crate::sqlgen;
use crate::table::TableMap;
use crate::value::{FromSqlValue, SqlValue};

/// One index as declared or as found in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub table_name: String,
    /// Canonical name, as returned by [`Dialect::build_index_name`].
    pub index_name: String,
    /// Column names in index order.
    pub columns: Vec<String>,
}

impl IndexDescriptor {
    fn same_columns(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

/// A schema change and the statement that performs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChange {
    pub index_name: String,
    pub sql: String,
}

/// The changes needed to bring one table's indexes in line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub table_name: String,
    pub drops: Vec<IndexChange>,
    pub creates: Vec<IndexChange>,
}

impl ReconcilePlan {
    /// Returns true when the schema already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drops.is_empty() && self.creates.is_empty()
    }

    /// Number of statements in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drops.len() + self.creates.len()
    }

    /// Statements in execution order, drops first.
    pub fn statements(&self) -> impl Iterator<Item = &IndexChange> {
        self.drops.iter().chain(&self.creates)
    }
}

/// The declared indexes of a table under their canonical names.
///
/// # Errors
///
/// Returns [`DbMapError::Unsupported`] when the dialect cannot name indexes.
pub fn desired_indexes(
    dialect: &dyn Dialect,
    table: &TableMap,
) -> Result<Vec<IndexDescriptor>> {
    table
        .indexes
        .iter()
        .map(|index| {
            Ok(IndexDescriptor {
                table_name: table.table_name.clone(),
                index_name: dialect.build_index_name(&table.table_name, &index.name)?,
                columns: index.columns.clone(),
            })
        })
        .collect()
}

fn first_text(row: &Row) -> Option<String> {
    row.get_index(0)
        .cloned()
        .and_then(|value| String::from_sql_value(value).ok())
}

async fn query_names<E: Executor>(executor: &E, sql: &str) -> Result<Vec<String>> {
    debug!(sql = %sql, "Introspecting indexes");
    let rows = executor
        .query(sql, &[] as &[SqlValue])
        .await
        .map_err(|err| DbMapError::execution(sql, err))?;
    Ok(rows.iter().filter_map(first_text).collect())
}

/// Computes the changes for one table without applying them.
///
/// # Errors
///
/// Returns [`DbMapError::Unsupported`] when the dialect cannot
/// introspect indexes, or the executor's error for a failed query.
pub async fn plan<E: Executor>(
    dialect: &dyn Dialect,
    executor: &E,
    table: &TableMap,
) -> Result<ReconcilePlan> {
    let schema = table.schema_name.as_deref();
    let desired = desired_indexes(dialect, table)?;
    let list_sql = dialect.index_list_query(&table.table_name, schema)?;
    let live = query_names(executor, &list_sql).await?;

    let mut plan = ReconcilePlan {
        table_name: table.table_name.clone(),
        ..ReconcilePlan::default()
    };

    for name in &live {
        if !desired
            .iter()
            .any(|d| d.index_name.eq_ignore_ascii_case(name))
        {
            plan.drops.push(IndexChange {
                index_name: name.clone(),
                sql: dialect.drop_index(table, name)?,
            });
        }
    }

    for (descriptor, index) in desired.iter().zip(&table.indexes) {
        let sql = dialect.index_exists_query(&table.table_name, &descriptor.index_name, schema)?;
        let columns = query_names(executor, &sql).await?;
        if !columns.is_empty() {
            if descriptor.same_columns(&columns) {
                continue;
            }
            debug!(
                table = %table.table_name,
                index = %descriptor.index_name,
                live = ?columns,
                declared = ?descriptor.columns,
                "Index columns changed"
            );
            plan.drops.push(IndexChange {
                index_name: descriptor.index_name.clone(),
                sql: dialect.drop_index(table, &descriptor.index_name)?,
            });
        }
        plan.creates.push(IndexChange {
            index_name: descriptor.index_name.clone(),
            sql: sqlgen::create_index(dialect, table, index)?,
        });
    }

    Ok(plan)
}

/// Executes a plan, drops first.
///
/// # Errors
///
/// Returns the first failing statement; earlier statements stay applied.
pub async fn apply<E: Executor>(executor: &E, plan: &ReconcilePlan) -> Result<()> {
    for change in &plan.drops {
        info!(table = %plan.table_name, index = %change.index_name, "Dropping index");
        execute(executor, &change.sql).await?;
    }
    for change in &plan.creates {
        info!(table = %plan.table_name, index = %change.index_name, "Creating index");
        execute(executor, &change.sql).await?;
    }
    Ok(())
}

async fn execute<E: Executor>(executor: &E, sql: &str) -> Result<()> {
    debug!(sql = %sql, "Executing SQL");
    executor
        .execute(sql, &[])
        .await
        .map_err(|err| DbMapError::execution(sql, err))?;
    Ok(())
}

/// Plans and applies the changes for one table.
///
/// # Errors
///
/// See [`plan`] and [`apply`].
pub async fn reconcile<E: Executor>(
    dialect: &dyn Dialect,
    executor: &E,
    table: &TableMap,
) -> Result<ReconcilePlan> {
    let plan = plan(dialect, executor, table).await?;
    apply(executor, &plan).await?;
    Ok(plan)
}
