//! Table maps: how one record type maps onto one table.
//!
//! [`build_table`] turns the parsed field descriptors of a record into a
//! validated [`TableMap`]. Column types are resolved against the dialect
//! at build time; everything downstream treats the map as read-only.

use std::collections::HashSet;

use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::record::{FieldType, RecordRef};
use crate::tags::FieldDescriptor;

/// One mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    /// Struct field the column is read from and written to.
    pub field_name: String,
    pub column_name: String,
    pub field_type: FieldType,
    /// Column type as rendered by the dialect.
    pub sql_type: String,
    pub max_size: usize,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
}

/// A declared index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    /// Declared (not dialect-canonical) name.
    pub name: String,
    /// Column names in declaration order.
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A one-to-many link to a child record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationMap {
    /// Parent field holding the children.
    pub field_name: String,
    pub child: RecordRef,
    /// Field or column on the child that stores the parent key.
    pub foreign_key: String,
}

/// The mapping of a record type onto a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMap {
    pub record: RecordRef,
    pub table_name: String,
    pub schema_name: Option<String>,
    /// Columns in field declaration order.
    pub columns: Vec<ColumnMap>,
    /// Positions in `columns` of the primary key, in key order.
    pub keys: Vec<usize>,
    pub indexes: Vec<IndexMap>,
    pub relations: Vec<RelationMap>,
}

impl TableMap {
    /// Schema-qualified, quoted table name.
    #[must_use]
    pub fn quoted_name(&self, dialect: &dyn Dialect) -> String {
        dialect.quoted_table_for_query(self.schema_name.as_deref(), &self.table_name)
    }

    /// Primary-key columns in key order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnMap> {
        self.keys.iter().map(|&i| &self.columns[i])
    }

    /// Columns outside the primary key, in declaration order.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnMap> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    /// The autoincrement column, if any.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&ColumnMap> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Finds a column by column name or field name, ignoring case.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnMap> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| c.field_name.eq_ignore_ascii_case(name))
            })
    }

    /// Declared index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMap> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Registration-time options overriding or extending the annotations.
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    table_name: Option<String>,
    schema_name: Option<String>,
    keys: Option<(bool, Vec<String>)>,
    indexes: Vec<IndexMap>,
}

impl TableOptions {
    /// Options with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table name; defaults to the record type name.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Schema the table lives in.
    #[must_use]
    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Declares the primary key, replacing any key annotations.
    ///
    /// With `auto_increment`, the first listed column is assigned by
    /// the database.
    #[must_use]
    pub fn keys(mut self, auto_increment: bool, columns: &[&str]) -> Self {
        let columns = columns.iter().map(ToString::to_string).collect();
        self.keys = Some((auto_increment, columns));
        self
    }

    /// Declares an index in addition to annotated ones.
    #[must_use]
    pub fn index(self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.add_index(name.into(), columns, false)
    }

    /// Declares a unique index in addition to annotated ones.
    #[must_use]
    pub fn unique_index(self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.add_index(name.into(), columns, true)
    }

    fn add_index(mut self, name: String, columns: &[&str], unique: bool) -> Self {
        self.indexes.push(IndexMap {
            name,
            columns: columns.iter().map(ToString::to_string).collect(),
            unique,
        });
        self
    }
}

/// Builds and validates the table map for a record type.
///
/// # Errors
///
/// Returns [`DbMapError::Config`] when a key column or index column does
/// not exist, when two fields map to the same column, when more than
/// one field is autoincrement, or when the autoincrement field is not
/// part of the primary key.
pub fn build_table(
    record: RecordRef,
    fields: Vec<FieldDescriptor>,
    dialect: &dyn Dialect,
    options: &TableOptions,
) -> Result<TableMap> {
    let table_name = options
        .table_name
        .clone()
        .unwrap_or_else(|| record.type_name().to_string());

    let mut columns = Vec::new();
    let mut relations = Vec::new();
    let mut tag_indexes: Vec<(String, Vec<usize>)> = Vec::new();
    for mut field in fields {
        if field.ignored {
            continue;
        }
        if let Some(relation) = field.relation.take() {
            let child = relation.child.ok_or_else(|| {
                DbMapError::config(
                    &table_name,
                    format!("relation {} has no child type", field.name),
                )
            })?;
            relations.push(RelationMap {
                field_name: field.name,
                child,
                foreign_key: relation.foreign_key,
            });
            continue;
        }
        if field.field_type == FieldType::Children {
            return Err(DbMapError::config(
                &table_name,
                format!(
                    "field {} holds records but declares no relation",
                    field.name
                ),
            ));
        }
        for index in &field.index_names {
            match tag_indexes.iter_mut().find(|(name, _)| name == index) {
                Some((_, members)) => members.push(columns.len()),
                None => tag_indexes.push((index.clone(), vec![columns.len()])),
            }
        }
        columns.push(ColumnMap {
            column_name: field.column().to_string(),
            field_name: field.name,
            field_type: field.field_type,
            sql_type: String::new(),
            max_size: field.max_size,
            nullable: field.nullable,
            primary_key: field.primary_key,
            auto_increment: field.auto_increment,
            unique: field.unique,
        });
    }

    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.column_name.to_lowercase()) {
            return Err(DbMapError::config(
                &table_name,
                format!("duplicate column {}", column.column_name),
            ));
        }
    }

    let keys = resolve_keys(&table_name, &mut columns, options.keys.as_ref())?;

    let auto: Vec<&ColumnMap> = columns.iter().filter(|c| c.auto_increment).collect();
    if auto.len() > 1 {
        return Err(DbMapError::config(
            &table_name,
            format!(
                "multiple autoincrement columns: {}",
                auto.iter()
                    .map(|c| c.column_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }
    if let Some(column) = auto.first() {
        if !column.primary_key {
            return Err(DbMapError::config(
                &table_name,
                format!(
                    "autoincrement column {} is not part of the primary key",
                    column.column_name
                ),
            ));
        }
    }

    for column in &mut columns {
        column.sql_type = dialect.to_sql_type(
            column.field_type,
            column.max_size,
            column.auto_increment,
        );
    }

    let mut indexes: Vec<IndexMap> = tag_indexes
        .into_iter()
        .map(|(name, members)| IndexMap {
            unique: members.iter().all(|&i| columns[i].unique),
            columns: members
                .iter()
                .map(|&i| columns[i].column_name.clone())
                .collect(),
            name,
        })
        .collect();

    for declared in &options.indexes {
        if indexes.iter().any(|i| i.name == declared.name) {
            return Err(DbMapError::config(
                &table_name,
                format!("index {} is declared twice", declared.name),
            ));
        }
        if declared.columns.is_empty() {
            return Err(DbMapError::config(
                &table_name,
                format!("index {} has no columns", declared.name),
            ));
        }
        let mut resolved = Vec::with_capacity(declared.columns.len());
        for name in &declared.columns {
            let column = find_column(&columns, name).ok_or_else(|| {
                DbMapError::config(
                    &table_name,
                    format!("index {} references unknown column {name}", declared.name),
                )
            })?;
            resolved.push(columns[column].column_name.clone());
        }
        indexes.push(IndexMap {
            name: declared.name.clone(),
            columns: resolved,
            unique: declared.unique,
        });
    }

    Ok(TableMap {
        record,
        table_name,
        schema_name: options.schema_name.clone(),
        columns,
        keys,
        indexes,
        relations,
    })
}

fn find_column(columns: &[ColumnMap], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.column_name.eq_ignore_ascii_case(name))
        .or_else(|| {
            columns
                .iter()
                .position(|c| c.field_name.eq_ignore_ascii_case(name))
        })
}

/// Applies the key override, if any, and returns key positions.
fn resolve_keys(
    table: &str,
    columns: &mut [ColumnMap],
    declared: Option<&(bool, Vec<String>)>,
) -> Result<Vec<usize>> {
    let Some((auto_increment, names)) = declared else {
        return Ok(columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect());
    };

    for column in columns.iter_mut() {
        column.primary_key = false;
        column.auto_increment = false;
    }
    let mut keys = Vec::with_capacity(names.len());
    for name in names {
        let Some(i) = find_column(columns, name) else {
            return Err(DbMapError::config(table, format!("key references unknown column {name}")));
        };
        if keys.contains(&i) {
            return Err(DbMapError::config(table, format!("key column {name} listed twice")));
        }
        columns[i].primary_key = true;
        columns[i].nullable = false;
        keys.push(i);
    }
    if *auto_increment {
        let Some(&first) = keys.first() else {
            return Err(DbMapError::config(table, "autoincrement key declared without columns"));
        };
        columns[first].auto_increment = true;
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::record::{FieldDef, Record};
    use crate::tags::parse_fields;

    #[derive(Debug, Default, crate::Record)]
    struct Person {
        #[db("primarykey, autoincrement")]
        id: i64,
        #[db("name: first_name, index: idx_name, unique")]
        first: String,
        #[db("name: last_name, index: idx_name, unique, size: 40")]
        last: String,
        #[db("index: idx_age")]
        age: i32,
        #[db("-")]
        scratch: String,
    }

    fn person_map(options: &TableOptions) -> Result<TableMap> {
        let fields = parse_fields(&Person::field_defs())?;
        build_table(
            RecordRef::of::<Person>(),
            fields,
            &SqliteDialect::new(),
            options,
        )
    }

    fn custom(defs: Vec<FieldDef>, options: &TableOptions) -> Result<TableMap> {
        build_table(
            RecordRef::of::<Person>(),
            parse_fields(&defs)?,
            &PostgresDialect::new(),
            options,
        )
    }

    #[test]
    fn test_columns_follow_declaration_order() {
        let map = person_map(&TableOptions::new()).unwrap();
        assert_eq!(map.table_name, "Person");
        let names: Vec<_> = map.columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "first_name", "last_name", "age"]);
        assert_eq!(map.keys, vec![0]);
        assert_eq!(map.columns[2].sql_type, "VARCHAR(40)");
        assert!(!map.columns[0].nullable);
    }

    #[test]
    fn test_shared_index_names_merge() {
        let map = person_map(&TableOptions::new()).unwrap();
        assert_eq!(
            map.index("idx_name"),
            Some(&IndexMap {
                name: "idx_name".into(),
                columns: vec!["first_name".into(), "last_name".into()],
                unique: true,
            })
        );
        assert!(!map.index("idx_age").unwrap().unique);
    }

    #[test]
    fn test_key_override_replaces_annotations() {
        let options = TableOptions::new().keys(false, &["last_name", "first"]);
        let map = person_map(&options).unwrap();
        let keys: Vec<_> = map.key_columns().map(|c| c.column_name.as_str()).collect();
        assert_eq!(keys, vec!["last_name", "first_name"]);
        assert!(map.auto_increment_column().is_none());
        assert!(!map.columns[0].primary_key);
    }

    #[test]
    fn test_key_override_with_auto_increment() {
        let options = TableOptions::new().keys(true, &["ID"]);
        let map = person_map(&options).unwrap();
        assert_eq!(map.auto_increment_column().unwrap().column_name, "id");
    }

    #[test]
    fn test_unknown_key_column() {
        let err = person_map(&TableOptions::new().keys(false, &["missing"])).unwrap_err();
        assert!(err.to_string().contains("unknown column missing"));
    }

    #[test]
    fn test_two_autoincrement_fields_fail() {
        let defs = vec![
            FieldDef::new("a", FieldType::Int64).with_tags(&[("db", "primarykey, autoincrement")]),
            FieldDef::new("b", FieldType::Int64).with_tags(&[("db", "primarykey, autoincrement")]),
        ];
        let err = custom(defs, &TableOptions::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("multiple autoincrement columns: a, b"));
    }

    #[test]
    fn test_autoincrement_outside_key_fails() {
        let defs = vec![
            FieldDef::new("a", FieldType::Int64).with_tags(&[("db", "primarykey")]),
            FieldDef::new("b", FieldType::Int64).with_tags(&[("db", "autoincrement")]),
        ];
        let err = custom(defs, &TableOptions::new()).unwrap_err();
        assert!(err.to_string().contains("not part of the primary key"));
    }

    #[test]
    fn test_duplicate_columns_fail() {
        let defs = vec![
            FieldDef::new("a", FieldType::Int64),
            FieldDef::new("b", FieldType::Int64).with_tags(&[("db", "name:A")]),
        ];
        let err = custom(defs, &TableOptions::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate column A"));
    }

    #[test]
    fn test_declared_indexes() {
        let options = TableOptions::new().unique_index("by_age", &["age", "last"]);
        let map = person_map(&options).unwrap();
        let index = map.index("by_age").unwrap();
        assert_eq!(index.columns, vec!["age", "last_name"]);
        assert!(index.unique);

        let err = person_map(&TableOptions::new().index("by_scratch", &["scratch"])).unwrap_err();
        assert!(err.to_string().contains("unknown column scratch"));
        let err = person_map(&TableOptions::new().index("idx_age", &["age"])).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_table_and_schema_names() {
        let map = person_map(&TableOptions::new().table("people").schema("app")).unwrap();
        assert_eq!(
            map.quoted_name(&PostgresDialect::new()),
            "\"app\".\"people\""
        );
    }
}
