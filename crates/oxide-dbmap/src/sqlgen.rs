//! SQL generation from table maps.
//!
//! Every statement is rendered through a [`Dialect`]: identifiers are
//! quoted with [`Dialect::quote_field`], placeholders come from
//! [`Dialect::bind_var`] numbered by their position among the bound
//! parameters of the statement, and statements end with
//! [`Dialect::query_suffix`].

use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::record::DynRecord;
use crate::table::{ColumnMap, IndexMap, TableMap};
use crate::value::{ConversionError, SqlValue};

/// A statement together with the fields bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPlan {
    pub sql: String,
    /// Fields whose values fill the placeholders, in order.
    pub arg_fields: Vec<String>,
    /// Field receiving the generated key, for inserts.
    pub auto_increment_field: Option<String>,
}

impl BindPlan {
    fn new(sql: String, arg_fields: Vec<String>) -> Self {
        Self {
            sql,
            arg_fields,
            auto_increment_field: None,
        }
    }

    /// Reads the bound values from a record.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::Conversion`] when the record lacks a field.
    pub fn bind_args(&self, record: &dyn DynRecord) -> Result<Vec<SqlValue>> {
        self.arg_fields
            .iter()
            .map(|field| {
                record.value_of(field).ok_or_else(|| DbMapError::Conversion {
                    column: field.clone(),
                    source: ConversionError::UnknownField(field.clone()),
                })
            })
            .collect()
    }
}

/// Builds a parameter list, numbering placeholders as they are added.
struct Binder<'a> {
    dialect: &'a dyn Dialect,
    fields: Vec<String>,
}

impl<'a> Binder<'a> {
    fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            fields: Vec::new(),
        }
    }

    fn bind(&mut self, column: &ColumnMap) -> String {
        let placeholder = self.dialect.bind_var(self.fields.len());
        self.fields.push(column.field_name.clone());
        placeholder
    }

    fn assignments<'c>(
        &mut self,
        columns: impl Iterator<Item = &'c ColumnMap>,
        separator: &str,
    ) -> String {
        let mut parts = Vec::new();
        for column in columns {
            let placeholder = self.bind(column);
            let name = self.dialect.quote_field(&column.column_name);
            parts.push(format!("{name} = {placeholder}"));
        }
        parts.join(separator)
    }
}

fn key_predicate(table: &TableMap, binder: &mut Binder<'_>) -> Result<String> {
    if table.keys.is_empty() {
        return Err(DbMapError::NoPrimaryKey(table.table_name.clone()));
    }
    Ok(binder.assignments(table.key_columns(), " AND "))
}

fn column_list(dialect: &dyn Dialect, table: &TableMap) -> String {
    table
        .columns
        .iter()
        .map(|c| dialect.quote_field(&c.column_name))
        .collect::<Vec<_>>()
        .join(", ")
}

// A declared single-column unique index already enforces the constraint.
fn has_unique_index(table: &TableMap, column: &ColumnMap) -> bool {
    table
        .indexes
        .iter()
        .any(|index| index.unique && index.columns == [column.column_name.as_str()])
}

fn column_definition(
    dialect: &dyn Dialect,
    table: &TableMap,
    column: &ColumnMap,
) -> Result<String> {
    let mut def = format!(
        "{} {}",
        dialect.quote_field(&column.column_name),
        column.sql_type
    );
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if column.auto_increment {
        if dialect.auto_increment_declares_primary_key() {
            if table.keys.len() > 1 {
                return Err(DbMapError::Unsupported {
                    dialect: dialect.name(),
                    operation: "autoincrement in a composite primary key",
                });
            }
            def.push_str(" PRIMARY KEY");
        }
        let clause = dialect.auto_increment_clause();
        if !clause.is_empty() {
            def.push(' ');
            def.push_str(clause);
        }
    } else if column.unique && !column.primary_key && !has_unique_index(table, column) {
        def.push_str(" UNIQUE");
    }
    Ok(def)
}

/// Generates CREATE TABLE.
///
/// # Errors
///
/// Returns the dialect's error when its table suffix is misconfigured,
/// or [`DbMapError::Unsupported`] for key layouts it cannot express.
pub fn create_table(
    dialect: &dyn Dialect,
    table: &TableMap,
    if_not_exists: bool,
) -> Result<String> {
    let command = if if_not_exists {
        dialect.if_table_not_exists(
            "CREATE TABLE",
            table.schema_name.as_deref(),
            &table.table_name,
        )
    } else {
        "CREATE TABLE".to_string()
    };

    let mut defs = table
        .columns
        .iter()
        .map(|c| column_definition(dialect, table, c))
        .collect::<Result<Vec<_>>>()?;

    let inline_key =
        dialect.auto_increment_declares_primary_key() && table.auto_increment_column().is_some();
    if !table.keys.is_empty() && !inline_key {
        let keys: Vec<String> = table
            .key_columns()
            .map(|c| dialect.quote_field(&c.column_name))
            .collect();
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    Ok(format!(
        "{command} {} ({}){}{}",
        table.quoted_name(dialect),
        defs.join(", "),
        dialect.create_table_suffix()?,
        dialect.query_suffix()
    ))
}

/// Generates DROP TABLE.
#[must_use]
pub fn drop_table(dialect: &dyn Dialect, table: &TableMap, if_exists: bool) -> String {
    let command = if if_exists {
        dialect.if_table_exists(
            "DROP TABLE",
            table.schema_name.as_deref(),
            &table.table_name,
        )
    } else {
        "DROP TABLE".to_string()
    };
    format!(
        "{command} {}{}",
        table.quoted_name(dialect),
        dialect.query_suffix()
    )
}

/// Generates the statement that removes every row of a table.
#[must_use]
pub fn truncate_table(dialect: &dyn Dialect, table: &TableMap) -> String {
    format!(
        "{} {}{}",
        dialect.truncate_clause(),
        table.quoted_name(dialect),
        dialect.query_suffix()
    )
}

/// Generates CREATE SCHEMA.
#[must_use]
pub fn create_schema(dialect: &dyn Dialect, schema: &str, if_not_exists: bool) -> String {
    let command = if if_not_exists {
        dialect.if_schema_not_exists("CREATE SCHEMA", schema)
    } else {
        "CREATE SCHEMA".to_string()
    };
    format!(
        "{command} {}{}",
        dialect.quote_field(schema),
        dialect.query_suffix()
    )
}

/// Generates CREATE INDEX under the dialect's canonical index name.
///
/// # Errors
///
/// Returns [`DbMapError::Unsupported`] when the dialect cannot name indexes.
pub fn create_index(dialect: &dyn Dialect, table: &TableMap, index: &IndexMap) -> Result<String> {
    let name = dialect.build_index_name(&table.table_name, &index.name)?;
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| dialect.quote_field(c))
        .collect();
    Ok(format!(
        "CREATE {}INDEX {} ON {} ({}){}",
        if index.unique { "UNIQUE " } else { "" },
        dialect.quote_field(&name),
        table.quoted_name(dialect),
        columns.join(", "),
        dialect.query_suffix()
    ))
}

/// Generates INSERT.
///
/// The autoincrement column is bound to the dialect's placeholder
/// literal, or left out when that literal is empty.
#[must_use]
pub fn insert(dialect: &dyn Dialect, table: &TableMap) -> BindPlan {
    let mut binder = Binder::new(dialect);
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut suffix = String::new();
    let mut auto_increment_field = None;

    for column in &table.columns {
        if column.auto_increment {
            auto_increment_field = Some(column.field_name.clone());
            suffix = dialect.auto_increment_insert_suffix(column);
            let placeholder = dialect.auto_increment_bind_value();
            if placeholder.is_empty() {
                continue;
            }
            columns.push(dialect.quote_field(&column.column_name));
            values.push(placeholder.to_string());
        } else {
            columns.push(dialect.quote_field(&column.column_name));
            values.push(binder.bind(column));
        }
    }

    let sql = if columns.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES{suffix}{}",
            table.quoted_name(dialect),
            dialect.query_suffix()
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}){suffix}{}",
            table.quoted_name(dialect),
            columns.join(", "),
            values.join(", "),
            dialect.query_suffix()
        )
    };
    BindPlan {
        auto_increment_field,
        ..BindPlan::new(sql, binder.fields)
    }
}

/// Generates UPDATE by primary key.
///
/// # Errors
///
/// Returns [`DbMapError::NoPrimaryKey`] or
/// [`DbMapError::NoUpdatableColumns`].
pub fn update(dialect: &dyn Dialect, table: &TableMap) -> Result<BindPlan> {
    if table.keys.is_empty() {
        return Err(DbMapError::NoPrimaryKey(table.table_name.clone()));
    }
    if table.non_key_columns().next().is_none() {
        return Err(DbMapError::NoUpdatableColumns(table.table_name.clone()));
    }
    let mut binder = Binder::new(dialect);
    let set = binder.assignments(table.non_key_columns(), ", ");
    let predicate = key_predicate(table, &mut binder)?;
    let sql = format!(
        "UPDATE {} SET {set} WHERE {predicate}{}",
        table.quoted_name(dialect),
        dialect.query_suffix()
    );
    Ok(BindPlan::new(sql, binder.fields))
}

/// Generates DELETE by primary key.
///
/// # Errors
///
/// Returns [`DbMapError::NoPrimaryKey`].
pub fn delete(dialect: &dyn Dialect, table: &TableMap) -> Result<BindPlan> {
    let mut binder = Binder::new(dialect);
    let predicate = key_predicate(table, &mut binder)?;
    let sql = format!(
        "DELETE FROM {} WHERE {predicate}{}",
        table.quoted_name(dialect),
        dialect.query_suffix()
    );
    Ok(BindPlan::new(sql, binder.fields))
}

/// Generates SELECT by primary key.
///
/// # Errors
///
/// Returns [`DbMapError::NoPrimaryKey`].
pub fn get(dialect: &dyn Dialect, table: &TableMap) -> Result<BindPlan> {
    let mut binder = Binder::new(dialect);
    let predicate = key_predicate(table, &mut binder)?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {predicate}{}",
        column_list(dialect, table),
        table.quoted_name(dialect),
        dialect.query_suffix()
    );
    Ok(BindPlan::new(sql, binder.fields))
}

/// Generates SELECT of every row.
#[must_use]
pub fn select_all(dialect: &dyn Dialect, table: &TableMap) -> String {
    format!(
        "SELECT {} FROM {}{}",
        column_list(dialect, table),
        table.quoted_name(dialect),
        dialect.query_suffix()
    )
}

/// Generates SELECT of the rows whose `column` equals one bound value,
/// ordered by primary key.
#[must_use]
pub fn select_by_column(dialect: &dyn Dialect, table: &TableMap, column: &ColumnMap) -> String {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        column_list(dialect, table),
        table.quoted_name(dialect),
        dialect.quote_field(&column.column_name),
        dialect.bind_var(0)
    );
    if !table.keys.is_empty() {
        let keys: Vec<String> = table
            .key_columns()
            .map(|c| dialect.quote_field(&c.column_name))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }
    sql.push_str(dialect.query_suffix());
    sql
}

/// Generates DELETE of the rows whose `column` equals one bound value.
#[must_use]
pub fn delete_by_column(dialect: &dyn Dialect, table: &TableMap, column: &ColumnMap) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}{}",
        table.quoted_name(dialect),
        dialect.quote_field(&column.column_name),
        dialect.bind_var(0),
        dialect.query_suffix()
    )
}
