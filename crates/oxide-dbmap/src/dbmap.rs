//! The CRUD orchestrator.
//!
//! [`DbMap`] ties a dialect, an executor and the registry of table maps
//! together. It runs generated statements, writes generated keys back
//! into records and cascades inserts, updates, fetches and deletes
//! through declared relations.
//!
//! Nothing here is transactional. A failure part-way through a
//! cascading operation stops it immediately and leaves the statements
//! already executed in place; wrap the executor in a transaction when
//! that matters.

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::dialect::{AutoIncrementStrategy, Dialect};
use crate::error::{DbMapError, Result};
use crate::executor::{ExecResult, Executor, Row};
use crate::record::{ChildCollection, DynRecord, FieldValues, Hook, Record, RecordRef};
use crate::reconcile::{self, ReconcilePlan};
use crate::registry::{Registry, ResolvedRelation};
use crate::sqlgen;
use crate::table::{ColumnMap, TableMap, TableOptions};
use crate::value::{ConversionError, FromSqlValue, SqlValue};

/// Outcome of reconciling one table's indexes.
#[derive(Debug)]
pub struct SyncReport {
    pub table_name: String,
    /// The applied plan, or why this table could not be reconciled.
    pub outcome: Result<ReconcilePlan>,
}

/// Maps registered record types onto tables of one database.
#[derive(Debug)]
pub struct DbMap<E> {
    dialect: Box<dyn Dialect>,
    executor: E,
    registry: Registry,
}

impl<E: Executor> DbMap<E> {
    /// Creates a map over `executor` speaking `dialect`.
    pub fn new(dialect: impl Dialect + 'static, executor: E) -> Self {
        Self::with_dialect(Box::new(dialect), executor)
    }

    /// Creates a map from an already boxed dialect, as returned by
    /// [`DialectConfig::build`](crate::DialectConfig::build).
    pub fn with_dialect(dialect: Box<dyn Dialect>, executor: E) -> Self {
        Self {
            dialect,
            executor,
            registry: Registry::new(),
        }
    }

    /// The dialect statements are generated for.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// The underlying executor.
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// The registered table maps.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers `T` under its type name with annotation-derived keys.
    ///
    /// # Errors
    ///
    /// Returns the annotation or validation error for the type.
    pub fn register<T: Record>(&mut self) -> Result<&TableMap> {
        self.register_with::<T>(&TableOptions::new())
    }

    /// Registers `T` with explicit table options.
    ///
    /// # Errors
    ///
    /// Returns the annotation or validation error for the type.
    pub fn register_with<T: Record>(&mut self, options: &TableOptions) -> Result<&TableMap> {
        self.registry.register::<T>(self.dialect.as_ref(), options)
    }

    /// The table map of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::NotRegistered`] when `T` was never registered.
    pub fn table_for<T: Record>(&self) -> Result<&TableMap> {
        self.registry.table::<T>()
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    /// Runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Execution`] wrapping the executor's error.
    pub async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult> {
        debug!(sql = %sql, params = ?params, "Executing SQL");
        self.executor
            .execute(sql, params)
            .await
            .map_err(|err| DbMapError::execution(sql, err))
    }

    async fn fetch(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(sql = %sql, params = ?params, "Querying");
        self.executor
            .query(sql, params)
            .await
            .map_err(|err| DbMapError::execution(sql, err))
    }

    /// Runs a query and maps each row onto `T` by column name.
    ///
    /// Result columns with no matching field are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::NotRegistered`], an execution error, or a
    /// conversion error for a column that does not fit its field.
    pub async fn select<T: Record>(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<T>> {
        let table = self.registry.table::<T>()?;
        let rows = self.fetch(sql, params).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = T::from_values(row_values(table, row)).map_err(field_error)?;
            run_hook(&mut record, Hook::PostGet)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Like [`select`](Self::select) but returns only the first row.
    ///
    /// # Errors
    ///
    /// See [`select`](Self::select).
    pub async fn select_one<T: Record>(&self, sql: &str, params: &[SqlValue]) -> Result<Option<T>> {
        Ok(self.select::<T>(sql, params).await?.into_iter().next())
    }

    /// First column of the first row, `None` for no rows or NULL.
    ///
    /// # Errors
    ///
    /// Returns an execution error or a conversion error.
    pub async fn select_value<T: FromSqlValue>(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<T>> {
        let rows = self.fetch(sql, params).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let (column, value) = row
            .into_pairs()
            .next()
            .unwrap_or_else(|| (String::new(), SqlValue::Null));
        if value.is_null() {
            return Ok(None);
        }
        T::from_sql_value(value)
            .map(Some)
            .map_err(|source| DbMapError::Conversion { column, source })
    }

    /// Integer scalar query; no rows or NULL yield 0.
    ///
    /// # Errors
    ///
    /// See [`select_value`](Self::select_value).
    pub async fn select_int(&self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        Ok(self.select_value(sql, params).await?.unwrap_or_default())
    }

    /// Integer scalar query that keeps NULL apart from 0.
    ///
    /// # Errors
    ///
    /// See [`select_value`](Self::select_value).
    pub async fn select_opt_int(&self, sql: &str, params: &[SqlValue]) -> Result<Option<i64>> {
        self.select_value(sql, params).await
    }

    /// Float scalar query; no rows or NULL yield 0.
    ///
    /// # Errors
    ///
    /// See [`select_value`](Self::select_value).
    pub async fn select_float(&self, sql: &str, params: &[SqlValue]) -> Result<f64> {
        Ok(self.select_value(sql, params).await?.unwrap_or_default())
    }

    /// Text scalar query; no rows or NULL yield an empty string.
    ///
    /// # Errors
    ///
    /// See [`select_value`](Self::select_value).
    pub async fn select_str(&self, sql: &str, params: &[SqlValue]) -> Result<String> {
        Ok(self.select_value(sql, params).await?.unwrap_or_default())
    }

    /// Text scalar query that keeps NULL apart from the empty string.
    ///
    /// # Errors
    ///
    /// See [`select_value`](Self::select_value).
    pub async fn select_opt_str(&self, sql: &str, params: &[SqlValue]) -> Result<Option<String>> {
        self.select_value(sql, params).await
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    async fn create_all(&self, if_not_exists: bool) -> Result<()> {
        let dialect = self.dialect();
        for table in self.registry.tables() {
            if let Some(schema) = table.schema_name.as_deref() {
                if dialect.supports_schemas() {
                    self.exec(&sqlgen::create_schema(dialect, schema, true), &[])
                        .await?;
                }
            }
            self.exec(&sqlgen::create_table(dialect, table, if_not_exists)?, &[])
                .await?;
            info!(table = %table.table_name, "Created table");
        }
        Ok(())
    }

    /// Creates every registered table.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn create_tables(&self) -> Result<()> {
        self.create_all(false).await
    }

    /// Creates every registered table that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn create_tables_if_not_exists(&self) -> Result<()> {
        self.create_all(true).await
    }

    async fn drop_all(&self, if_exists: bool) -> Result<()> {
        for table in self.registry.tables().rev() {
            self.exec(&sqlgen::drop_table(self.dialect(), table, if_exists), &[])
                .await?;
            info!(table = %table.table_name, "Dropped table");
        }
        Ok(())
    }

    /// Drops every registered table, last registered first.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn drop_tables(&self) -> Result<()> {
        self.drop_all(false).await
    }

    /// Drops every registered table that exists.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn drop_tables_if_exists(&self) -> Result<()> {
        self.drop_all(true).await
    }

    /// Removes all rows from every registered table.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn truncate_tables(&self) -> Result<()> {
        for table in self.registry.tables() {
            self.exec(&sqlgen::truncate_table(self.dialect(), table), &[])
                .await?;
        }
        Ok(())
    }

    /// CREATE INDEX statements for every declared index.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Unsupported`] when the dialect cannot name indexes.
    pub fn create_index_statements(&self) -> Result<Vec<String>> {
        let mut statements = Vec::new();
        for table in self.registry.tables() {
            for index in &table.indexes {
                statements.push(sqlgen::create_index(self.dialect(), table, index)?);
            }
        }
        Ok(statements)
    }

    /// Creates every declared index without consulting the live schema.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement.
    pub async fn create_indexes(&self) -> Result<()> {
        for sql in self.create_index_statements()? {
            self.exec(&sql, &[]).await?;
        }
        Ok(())
    }

    /// Brings the indexes of every registered table in line with their
    /// declarations.
    ///
    /// Each table is reconciled on its own; a failure is reported for
    /// that table and the remaining tables are still processed.
    pub async fn sync_indexes(&self) -> Vec<SyncReport> {
        let mut reports = Vec::with_capacity(self.registry.len());
        for table in self.registry.tables() {
            let outcome = reconcile::reconcile(self.dialect(), &self.executor, table).await;
            if let Err(err) = &outcome {
                warn!(table = %table.table_name, error = %err, "Index reconciliation failed");
            }
            reports.push(SyncReport {
                table_name: table.table_name.clone(),
                outcome,
            });
        }
        reports
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Inserts one row and writes any generated key back into `record`.
    ///
    /// # Errors
    ///
    /// Returns hook, execution and conversion errors.
    pub async fn insert<T: Record>(&self, record: &mut T) -> Result<()> {
        let table = self.registry.table::<T>()?;
        self.insert_record(table, record, false).await
    }

    /// Inserts `record`, then every child of every relation, recursively.
    ///
    /// Each child's foreign key is set to the parent key before it is
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns the first failure; rows inserted before it remain.
    pub async fn insert_with_children<T: Record>(&self, record: &mut T) -> Result<()> {
        let table = self.registry.table::<T>()?;
        self.insert_record(table, record, true).await
    }

    /// Updates the row of `record` by primary key.
    ///
    /// Returns the number of affected rows; 0 is not an error.
    ///
    /// # Errors
    ///
    /// Returns key, hook, execution and conversion errors.
    pub async fn update<T: Record>(&self, record: &mut T) -> Result<u64> {
        let table = self.registry.table::<T>()?;
        self.update_record(table, record).await
    }

    /// Updates `record` and replaces its children.
    ///
    /// Every existing child row referencing the parent is deleted, with
    /// its own descendants, and the in-memory children are inserted
    /// again. Child keys are therefore reassigned on every update.
    ///
    /// A parent mapping nothing but key columns has no row to update;
    /// its hooks still run, its children are replaced and 0 is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failure; statements before it remain applied.
    pub async fn update_with_children<T: Record>(&self, record: &mut T) -> Result<u64> {
        let table = self.registry.table::<T>()?;
        let affected = if table.keys.is_empty() || table.non_key_columns().next().is_some() {
            self.update_record(table, record).await?
        } else {
            debug!(table = %table.table_name, "No columns to update, replacing children only");
            run_hook(record, Hook::PreUpdate)?;
            run_hook(record, Hook::PostUpdate)?;
            0
        };
        for relation in &table.relations {
            let resolved = self.registry.resolve(table, relation)?;
            let key = parent_key_value(record, &resolved)?;
            self.delete_by_parent(resolved.child, resolved.foreign_key, key)
                .await?;
        }
        self.insert_children(table, record).await?;
        Ok(affected)
    }

    /// Deletes the row of `record` by primary key.
    ///
    /// # Errors
    ///
    /// Returns key, hook and execution errors.
    pub async fn delete<T: Record>(&self, record: &mut T) -> Result<u64> {
        let table = self.registry.table::<T>()?;
        self.delete_record(table, record, false).await
    }

    /// Deletes the children of `record`, deepest level first, then the
    /// record itself.
    ///
    /// # Errors
    ///
    /// Returns the first failure; statements before it remain applied.
    pub async fn delete_with_children<T: Record>(&self, record: &mut T) -> Result<u64> {
        let table = self.registry.table::<T>()?;
        self.delete_record(table, record, true).await
    }

    /// Fetches a record by its primary-key values, in key order.
    ///
    /// # Errors
    ///
    /// Returns key, execution, conversion and hook errors.
    pub async fn get<T: Record>(&self, keys: &[SqlValue]) -> Result<Option<T>> {
        let table = self.registry.table::<T>()?;
        let Some(mut record) = self.fetch_by_key::<T>(table, keys).await? else {
            return Ok(None);
        };
        run_hook(&mut record, Hook::PostGet)?;
        Ok(Some(record))
    }

    /// Fetches a record and, recursively, the children of its relations.
    ///
    /// # Errors
    ///
    /// Returns key, execution, conversion and hook errors.
    pub async fn get_with_children<T: Record>(&self, keys: &[SqlValue]) -> Result<Option<T>> {
        let table = self.registry.table::<T>()?;
        let Some(mut record) = self.fetch_by_key::<T>(table, keys).await? else {
            return Ok(None);
        };
        self.fetch_children(table, &mut record).await?;
        run_hook(&mut record, Hook::PostGet)?;
        Ok(Some(record))
    }

    async fn fetch_by_key<T: Record>(
        &self,
        table: &TableMap,
        keys: &[SqlValue],
    ) -> Result<Option<T>> {
        let plan = sqlgen::get(self.dialect(), table)?;
        if keys.len() != table.keys.len() {
            return Err(DbMapError::config(
                &table.table_name,
                format!(
                    "expected {} key values, got {}",
                    table.keys.len(),
                    keys.len()
                ),
            ));
        }
        let rows = self.fetch(&plan.sql, keys).await?;
        rows.into_iter()
            .next()
            .map(|row| T::from_values(row_values(table, row)).map_err(field_error))
            .transpose()
    }

    fn insert_record<'a>(
        &'a self,
        table: &'a TableMap,
        record: &'a mut dyn DynRecord,
        cascade: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            run_hook(record, Hook::PreInsert)?;
            let dialect = self.dialect();
            let plan = sqlgen::insert(dialect, table);
            let args = plan.bind_args(record)?;

            match &plan.auto_increment_field {
                Some(field) => {
                    let id = match dialect.auto_increment_strategy() {
                        AutoIncrementStrategy::LastInsertId => {
                            self.exec(&plan.sql, &args).await?.last_insert_id
                        }
                        AutoIncrementStrategy::Returning => self
                            .fetch(&plan.sql, &args)
                            .await?
                            .first()
                            .and_then(|row| row.get_index(0))
                            .and_then(SqlValue::as_i64),
                    };
                    let id =
                        id.ok_or_else(|| DbMapError::MissingGeneratedKey(plan.sql.clone()))?;
                    debug!(table = %table.table_name, id, "Assigned generated key");
                    record
                        .assign(field, SqlValue::Int(id))
                        .map_err(|source| DbMapError::Conversion {
                            column: field.clone(),
                            source,
                        })?;
                }
                None => {
                    self.exec(&plan.sql, &args).await?;
                }
            }

            run_hook(record, Hook::PostInsert)?;
            if cascade {
                self.insert_children(table, record).await?;
            }
            Ok(())
        })
    }

    fn insert_children<'a>(
        &'a self,
        table: &'a TableMap,
        record: &'a mut dyn DynRecord,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for relation in &table.relations {
                let resolved = self.registry.resolve(table, relation)?;
                let key = parent_key_value(record, &resolved)?;
                let children = relation_mut(record, &resolved)?;
                for i in 0..children.len() {
                    let Some(child) = children.child_mut(i) else {
                        continue;
                    };
                    child
                        .assign(&resolved.foreign_key.field_name, key.clone())
                        .map_err(|source| DbMapError::Conversion {
                            column: resolved.foreign_key.field_name.clone(),
                            source,
                        })?;
                    self.insert_record(resolved.child, child, true).await?;
                }
            }
            Ok(())
        })
    }

    async fn update_record(&self, table: &TableMap, record: &mut dyn DynRecord) -> Result<u64> {
        let plan = sqlgen::update(self.dialect(), table)?;
        run_hook(record, Hook::PreUpdate)?;
        let args = plan.bind_args(record)?;
        let result = self.exec(&plan.sql, &args).await?;
        run_hook(record, Hook::PostUpdate)?;
        Ok(result.rows_affected)
    }

    async fn delete_record(
        &self,
        table: &TableMap,
        record: &mut dyn DynRecord,
        cascade: bool,
    ) -> Result<u64> {
        let plan = sqlgen::delete(self.dialect(), table)?;
        run_hook(record, Hook::PreDelete)?;
        if cascade {
            for relation in &table.relations {
                let resolved = self.registry.resolve(table, relation)?;
                let key = parent_key_value(record, &resolved)?;
                self.delete_by_parent(resolved.child, resolved.foreign_key, key)
                    .await?;
            }
        }
        let args = plan.bind_args(record)?;
        let result = self.exec(&plan.sql, &args).await?;
        run_hook(record, Hook::PostDelete)?;
        Ok(result.rows_affected)
    }

    /// Deletes the rows of `child` referencing `key`, after their own
    /// descendants.
    fn delete_by_parent<'a>(
        &'a self,
        child: &'a TableMap,
        foreign_key: &'a ColumnMap,
        key: SqlValue,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let dialect = self.dialect();
            if !child.relations.is_empty() {
                let sql = sqlgen::select_by_column(dialect, child, foreign_key);
                let rows = self.fetch(&sql, std::slice::from_ref(&key)).await?;
                for relation in &child.relations {
                    let resolved = self.registry.resolve(child, relation)?;
                    for row in &rows {
                        let Some(child_key) = row.get(&resolved.parent_key.column_name) else {
                            continue;
                        };
                        self.delete_by_parent(
                            resolved.child,
                            resolved.foreign_key,
                            child_key.clone(),
                        )
                        .await?;
                    }
                }
            }
            let sql = sqlgen::delete_by_column(dialect, child, foreign_key);
            Ok(self.exec(&sql, &[key]).await?.rows_affected)
        })
    }

    fn fetch_children<'a>(
        &'a self,
        table: &'a TableMap,
        record: &'a mut dyn DynRecord,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for relation in &table.relations {
                let resolved = self.registry.resolve(table, relation)?;
                let key = parent_key_value(record, &resolved)?;
                let sql =
                    sqlgen::select_by_column(self.dialect(), resolved.child, resolved.foreign_key);
                let rows = self.fetch(&sql, &[key]).await?;

                let children = relation_mut(record, &resolved)?;
                children.clear();
                for row in rows {
                    children
                        .push_values(row_values(resolved.child, row))
                        .map_err(field_error)?;
                    let last = children.len() - 1;
                    let Some(child) = children.child_mut(last) else {
                        continue;
                    };
                    self.fetch_children(resolved.child, child).await?;
                    run_hook(child, Hook::PostGet)?;
                }
            }
            Ok(())
        })
    }
}

/// Maps result columns onto field names of `table`.
fn row_values(table: &TableMap, row: Row) -> FieldValues {
    let mut values = FieldValues::new();
    for (column, value) in row.into_pairs() {
        match table.find_column(&column) {
            Some(mapped) => values.insert(mapped.field_name.clone(), value),
            None => warn!(
                table = %table.table_name,
                column = %column,
                "Result column has no destination field"
            ),
        }
    }
    values
}

fn field_error((column, source): (String, ConversionError)) -> DbMapError {
    DbMapError::Conversion { column, source }
}

fn run_hook(record: &mut dyn DynRecord, hook: Hook) -> Result<()> {
    record.hook(hook).map_err(|source| DbMapError::Hook {
        hook: hook.name(),
        record: record.record_ref().type_name(),
        source,
    })
}

fn parent_key_value(record: &dyn DynRecord, resolved: &ResolvedRelation<'_>) -> Result<SqlValue> {
    let field = &resolved.parent_key.field_name;
    record.value_of(field).ok_or_else(|| DbMapError::Conversion {
        column: field.clone(),
        source: ConversionError::UnknownField(field.clone()),
    })
}

fn relation_mut<'r>(
    record: &'r mut dyn DynRecord,
    resolved: &ResolvedRelation<'_>,
) -> Result<&'r mut dyn ChildCollection> {
    let owner: RecordRef = record.record_ref();
    let field = &resolved.relation.field_name;
    record
        .child_relations_mut()
        .into_iter()
        .find(|(name, _)| name == field)
        .map(|(_, children)| children)
        .ok_or_else(|| {
            DbMapError::config(
                owner.type_name(),
                format!("record exposes no children for relation {field}"),
            )
        })
}
