mod common;

use common::{table, table_with, Product, Shelf, Slot};
use oxide_dbmap::{
    sqlgen, Dialect, MySqlDialect, OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect,
    TableOptions,
};

fn dialects() -> Vec<Box<dyn Dialect>> {
    vec![
        Box::new(SqliteDialect::new()),
        Box::new(PostgresDialect::new()),
        Box::new(MySqlDialect::new("InnoDB", "UTF8")),
        Box::new(SqlServerDialect::new()),
        Box::new(OracleDialect::new()),
    ]
}

#[test]
fn create_table_per_dialect() {
    let expected = [
        "CREATE TABLE \"Product\" (\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \
         \"sku\" VARCHAR(32) NOT NULL UNIQUE, \"price\" REAL, \"in_stock\" INTEGER, \
         \"added\" DATETIME);",
        "CREATE TABLE \"product\" (\"id\" BIGSERIAL NOT NULL, \"sku\" VARCHAR(32) NOT NULL UNIQUE, \
         \"price\" DOUBLE PRECISION, \"in_stock\" BOOLEAN, \"added\" TIMESTAMP WITH TIME ZONE, \
         PRIMARY KEY (\"id\"));",
        "CREATE TABLE `Product` (`id` BIGINT NOT NULL AUTO_INCREMENT, \
         `sku` VARCHAR(32) NOT NULL UNIQUE, `price` DOUBLE, `in_stock` BOOLEAN, \
         `added` DATETIME, PRIMARY KEY (`id`)) ENGINE=InnoDB CHARSET=UTF8;",
        "CREATE TABLE [Product] ([id] BIGINT NOT NULL IDENTITY(0,1), \
         [sku] NVARCHAR(32) NOT NULL UNIQUE, [price] FLOAT(53), [in_stock] BIT, \
         [added] DATETIME2, PRIMARY KEY ([id]));",
        "CREATE TABLE \"PRODUCT\" (\"ID\" NUMBER(19) GENERATED BY DEFAULT AS IDENTITY NOT NULL, \
         \"SKU\" VARCHAR2(32) NOT NULL UNIQUE, \"PRICE\" BINARY_DOUBLE, \"IN_STOCK\" NUMBER(1), \
         \"ADDED\" TIMESTAMP WITH TIME ZONE, PRIMARY KEY (\"ID\"))",
    ];
    for (dialect, expected) in dialects().iter().zip(expected) {
        let product = table::<Product>(dialect.as_ref());
        assert_eq!(
            sqlgen::create_table(dialect.as_ref(), &product, false).unwrap(),
            expected,
            "dialect {}",
            dialect.name()
        );
    }
}

#[test]
fn guarded_ddl_per_dialect() {
    let expected = [
        (
            "CREATE TABLE IF NOT EXISTS \"Slot\"",
            "DROP TABLE IF EXISTS \"Slot\";",
        ),
        (
            "CREATE TABLE IF NOT EXISTS \"slot\"",
            "DROP TABLE IF EXISTS \"slot\";",
        ),
        (
            "CREATE TABLE IF NOT EXISTS `Slot`",
            "DROP TABLE IF EXISTS `Slot`;",
        ),
        (
            "IF OBJECT_ID('[Slot]') IS NULL CREATE TABLE [Slot]",
            "IF OBJECT_ID('[Slot]') IS NOT NULL DROP TABLE [Slot];",
        ),
        (
            "CREATE TABLE IF NOT EXISTS \"SLOT\"",
            "DROP TABLE IF EXISTS \"SLOT\"",
        ),
    ];
    for (dialect, (create, drop)) in dialects().iter().zip(expected) {
        let slot = table::<Slot>(dialect.as_ref());
        let sql = sqlgen::create_table(dialect.as_ref(), &slot, true).unwrap();
        assert!(sql.starts_with(create), "{sql}");
        assert_eq!(sqlgen::drop_table(dialect.as_ref(), &slot, true), drop);
    }
}

#[test]
fn composite_keys_bind_in_key_order() {
    let dialect = OracleDialect::new();
    let slot = table::<Slot>(&dialect);
    let plan = sqlgen::update(&dialect, &slot).unwrap();
    assert_eq!(
        plan.sql,
        "UPDATE \"SLOT\" SET \"PRODUCT_ID\" = :1 WHERE \"SHELF_ID\" = :2 AND \"POSITION\" = :3"
    );
    assert_eq!(plan.arg_fields, vec!["product_id", "shelf_id", "position"]);

    let dialect = SqliteDialect::new();
    let slot = table::<Slot>(&dialect);
    assert_eq!(
        sqlgen::create_table(&dialect, &slot, false).unwrap(),
        "CREATE TABLE \"Slot\" (\"shelf_id\" INTEGER NOT NULL, \"position\" INTEGER NOT NULL, \
         \"product_id\" INTEGER, PRIMARY KEY (\"shelf_id\", \"position\"));"
    );
}

#[test]
fn relation_fields_are_not_columns() {
    let dialect = SqliteDialect::new();
    let shelf = table::<Shelf>(&dialect);
    assert_eq!(
        shelf
            .columns
            .iter()
            .map(|c| c.column_name.as_str())
            .collect::<Vec<_>>(),
        vec!["id", "label"]
    );
    assert_eq!(shelf.relations.len(), 1);
    assert_eq!(shelf.relations[0].field_name, "slots");
    assert_eq!(shelf.relations[0].foreign_key, "shelf_id");
    assert_eq!(
        sqlgen::insert(&dialect, &shelf).sql,
        "INSERT INTO \"Shelf\" (\"id\", \"label\") VALUES (NULL, ?);"
    );
}

#[test]
fn index_names_per_dialect() {
    let expected = [
        "CREATE INDEX \"ix_Product_by_price\" ON \"Product\" (\"price\");",
        "CREATE INDEX \"ix_product_by_price\" ON \"product\" (\"price\");",
        "CREATE INDEX `by_price` ON `Product` (`price`);",
        "CREATE INDEX [by_price] ON [Product] ([price]);",
        "CREATE INDEX \"BY_PRICE\" ON \"PRODUCT\" (\"PRICE\")",
    ];
    let options = TableOptions::new().index("by_price", &["price"]);
    for (dialect, expected) in dialects().iter().zip(expected) {
        let product = table_with::<Product>(dialect.as_ref(), &options);
        let index = product.index("by_price").unwrap();
        assert_eq!(
            sqlgen::create_index(dialect.as_ref(), &product, index).unwrap(),
            expected
        );
    }
}

#[test]
fn schema_qualified_tables() {
    let options = TableOptions::new().schema("Shop").table("Items");
    let dialect = PostgresDialect::new();
    let items = table_with::<Product>(&dialect, &options);
    assert_eq!(
        sqlgen::truncate_table(&dialect, &items),
        "TRUNCATE \"shop\".\"items\";"
    );
    assert_eq!(
        dialect.drop_index(&items, "ix_items_by_price").unwrap(),
        "DROP INDEX \"shop\".\"ix_items_by_price\";"
    );

    let dialect = SqlServerDialect::new();
    let items = table_with::<Product>(&dialect, &options);
    assert_eq!(
        sqlgen::create_schema(&dialect, "Shop", true),
        "IF SCHEMA_ID(N'Shop') IS NULL CREATE SCHEMA [Shop];"
    );
    assert_eq!(
        sqlgen::drop_table(&dialect, &items, true),
        "IF OBJECT_ID('[Shop].[Items]') IS NOT NULL DROP TABLE [Shop].[Items];"
    );

    let dialect = SqliteDialect::new();
    let items = table_with::<Product>(&dialect, &options);
    assert_eq!(
        sqlgen::truncate_table(&dialect, &items),
        "DELETE FROM \"Items\";"
    );
}

#[test]
fn mysql_without_engine_cannot_create_tables() {
    let dialect = MySqlDialect::default();
    let product = table::<Product>(&dialect);
    let err = sqlgen::create_table(&dialect, &product, false).unwrap_err();
    assert!(
        err.to_string().contains("undefined engine, encoding"),
        "{err}"
    );
}
