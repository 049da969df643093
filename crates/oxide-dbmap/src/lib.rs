//! # oxide-dbmap
//!
//! Maps plain structs onto relational tables and generates
//! dialect-correct SQL for them.
//!
//! This crate provides:
//! - Dialects for SQLite, PostgreSQL, MySQL, SQL Server and Oracle
//! - A field annotation parser and a table model builder
//! - SQL generation for DDL, CRUD and child-relation queries
//! - Index reconciliation against a live schema
//! - An orchestrator ([`DbMap`]) that cascades CRUD through one-to-many
//!   relations on top of any [`Executor`]
//!
//! ## Mapping a struct
//!
//! ```rust
//! use oxide_dbmap::{sqlgen, Record, Registry, SqliteDialect, TableOptions};
//!
//! #[derive(Debug, Default, Record)]
//! struct Person {
//!     #[db("primarykey, autoincrement")]
//!     id: i64,
//!     #[db("name: first_name, notnull, size: 64")]
//!     first: String,
//! }
//!
//! let dialect = SqliteDialect::new();
//! let mut registry = Registry::new();
//! let table = registry.register::<Person>(&dialect, &TableOptions::new()).unwrap();
//!
//! assert_eq!(
//!     sqlgen::create_table(&dialect, table, false).unwrap(),
//!     "CREATE TABLE \"Person\" (\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
//!      \"first_name\" VARCHAR(64) NOT NULL);"
//! );
//! assert_eq!(
//!     sqlgen::insert(&dialect, table).sql,
//!     "INSERT INTO \"Person\" (\"id\", \"first_name\") VALUES (NULL, ?);"
//! );
//! ```
//!
//! ## Relations
//!
//! A `Vec` of records tagged `relation: <foreign key>` is a one-to-many
//! relation. The foreign key names a field or column of the child that
//! holds the parent's autoincrement (or single primary-key) value.
//! [`DbMap::insert_with_children`], [`DbMap::update_with_children`],
//! [`DbMap::get_with_children`] and [`DbMap::delete_with_children`]
//! walk relations recursively.

extern crate self as oxide_dbmap;

pub mod config;
pub mod dbmap;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod sqlgen;
pub mod table;
pub mod tags;
pub mod value;

#[cfg(test)]
mod test_support;

pub use config::{DialectConfig, DialectKind};
pub use dbmap::{DbMap, SyncReport};
pub use dialect::{
    AutoIncrementStrategy, Dialect, MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect,
    SqliteDialect,
};
pub use error::{BoxError, DbMapError, Result};
pub use executor::{ExecResult, Executor, Row};
pub use oxide_dbmap_derive::Record;
pub use reconcile::{IndexChange, IndexDescriptor, ReconcilePlan};
pub use record::{
    ChildCollection, DynRecord, FieldDef, FieldType, FieldValues, Hook, HookResult, Record,
    RecordHooks, RecordRef,
};
pub use registry::{Registry, ResolvedRelation};
pub use table::{ColumnMap, IndexMap, RelationMap, TableMap, TableOptions};
pub use tags::{FieldDescriptor, RelationDescriptor};
pub use value::{ConversionError, FromSqlValue, SqlValue, ToSqlValue};
