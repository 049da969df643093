//! The registry of table maps, keyed by record type.
//!
//! Registration takes `&mut self` and is expected to happen once at
//! startup; afterwards the registry is shared read-only. Relations are
//! resolved against the registry when they are used, so parents may be
//! registered before their children.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::record::{Record, RecordRef};
use crate::table::{build_table, ColumnMap, RelationMap, TableMap, TableOptions};
use crate::tags::parse_fields;

/// A relation with both ends looked up.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRelation<'a> {
    pub relation: &'a RelationMap,
    pub child: &'a TableMap,
    /// Child column holding the parent key.
    pub foreign_key: &'a ColumnMap,
    /// Parent column whose value the children reference.
    pub parent_key: &'a ColumnMap,
}

/// Table maps for every registered record type.
#[derive(Debug, Default)]
pub struct Registry {
    tables: Vec<TableMap>,
    by_type: HashMap<TypeId, usize>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses, builds and stores the table map for `T`.
    ///
    /// Registering a type again replaces its previous map.
    ///
    /// # Errors
    ///
    /// Returns the annotation or validation error for the type.
    pub fn register<T: Record>(
        &mut self,
        dialect: &dyn Dialect,
        options: &TableOptions,
    ) -> Result<&TableMap> {
        let record = RecordRef::of::<T>();
        let fields = parse_fields(&T::field_defs())?;
        let table = build_table(record, fields, dialect, options)?;
        debug!(record = record.type_name(), table = %table.table_name, "Registered table");

        let index = match self.by_type.get(&record.type_id()) {
            Some(&index) => {
                self.tables[index] = table;
                index
            }
            None => {
                self.tables.push(table);
                self.by_type.insert(record.type_id(), self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        Ok(&self.tables[index])
    }

    /// Table map of record type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::NotRegistered`] when `T` was never registered.
    pub fn table<T: Record>(&self) -> Result<&TableMap> {
        self.table_of(RecordRef::of::<T>())
    }

    /// Table map of a record type known at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::NotRegistered`] when the type was never registered.
    pub fn table_of(&self, record: RecordRef) -> Result<&TableMap> {
        self.by_type
            .get(&record.type_id())
            .map(|&i| &self.tables[i])
            .ok_or(DbMapError::NotRegistered(record.type_name()))
    }

    /// Registered tables, in registration order.
    pub fn tables(&self) -> impl DoubleEndedIterator<Item = &TableMap> {
        self.tables.iter()
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Looks up the child table and both key columns of a relation.
    ///
    /// # Errors
    ///
    /// Returns [`DbMapError::UnresolvedRelation`] when the child type was
    /// never registered, and [`DbMapError::Config`] when the foreign key
    /// is not a child column or the parent has no single key column.
    pub fn resolve<'a>(
        &'a self,
        parent: &'a TableMap,
        relation: &'a RelationMap,
    ) -> Result<ResolvedRelation<'a>> {
        let child = self
            .table_of(relation.child)
            .map_err(|_| DbMapError::UnresolvedRelation {
                table: parent.table_name.clone(),
                field: relation.field_name.clone(),
                child: relation.child.type_name().to_string(),
            })?;
        let foreign_key = child.find_column(&relation.foreign_key).ok_or_else(|| {
            DbMapError::config(
                &parent.table_name,
                format!(
                    "relation {} names unknown column {} on {}",
                    relation.field_name, relation.foreign_key, child.table_name
                ),
            )
        })?;
        let parent_key = parent_key(parent).ok_or_else(|| {
            DbMapError::config(
                &parent.table_name,
                format!(
                    "relation {} needs an autoincrement or single-column primary key",
                    relation.field_name
                ),
            )
        })?;
        Ok(ResolvedRelation {
            relation,
            child,
            foreign_key,
            parent_key,
        })
    }

    /// Resolves every relation of every table.
    ///
    /// Useful once all types are registered, to surface configuration
    /// errors before the first cascading operation.
    ///
    /// # Errors
    ///
    /// Returns the first relation that cannot be resolved.
    pub fn validate(&self) -> Result<()> {
        for table in &self.tables {
            for relation in &table.relations {
                self.resolve(table, relation)?;
            }
        }
        Ok(())
    }
}

/// The column children reference: the autoincrement column, else the
/// only primary-key column.
fn parent_key(table: &TableMap) -> Option<&ColumnMap> {
    table.auto_increment_column().or_else(|| {
        if table.keys.len() == 1 {
            table.key_columns().next()
        } else {
            None
        }
    })
}
