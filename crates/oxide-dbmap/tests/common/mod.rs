#![allow(dead_code)]

use chrono::{DateTime, Utc};
use oxide_dbmap::{Dialect, Record, Registry, TableMap, TableOptions};

#[derive(Debug, Default, Record)]
pub struct Product {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    #[db("name: sku, notnull, unique, size: 32")]
    pub code: String,
    pub price: f64,
    pub in_stock: bool,
    pub added: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Record)]
pub struct Shelf {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    pub label: String,
    #[db("relation: shelf_id")]
    pub slots: Vec<Slot>,
}

#[derive(Debug, Default, Record)]
pub struct Slot {
    #[db("primarykey")]
    pub shelf_id: i64,
    #[db("primarykey")]
    pub position: i32,
    pub product_id: Option<i64>,
}

/// Builds the table map of `T` with `options`.
pub fn table_with<T: Record>(dialect: &dyn Dialect, options: &TableOptions) -> TableMap {
    let mut registry = Registry::new();
    registry
        .register::<T>(dialect, options)
        .unwrap_or_else(|e| panic!("Failed to register {}: {e}", T::type_name()))
        .clone()
}

/// Builds the table map of `T` with default options.
pub fn table<T: Record>(dialect: &dyn Dialect) -> TableMap {
    table_with::<T>(dialect, &TableOptions::new())
}
