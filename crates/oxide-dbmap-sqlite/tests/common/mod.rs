#![allow(dead_code)]

use chrono::{DateTime, Utc};
use oxide_dbmap::{DbMap, HookResult, Record, RecordHooks, SqliteDialect, TableOptions};
use oxide_dbmap_sqlite::SqliteExecutor;

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Person {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    #[db("name: first_name, notnull, size: 64, index: by_name")]
    pub first: String,
    #[db("index: by_name")]
    pub last: String,
    #[db("unique, index: by_email")]
    pub email: String,
    pub age: Option<i32>,
    pub joined: Option<DateTime<Utc>>,
    #[db("-")]
    pub display: String,
}

impl Person {
    pub fn new(first: &str, last: &str, email: &str) -> Self {
        Self {
            first: first.to_string(),
            last: last.to_string(),
            email: email.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Invoice {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    #[db("notnull")]
    pub memo: String,
    #[db("relation: invoice_id")]
    pub lines: Vec<Line>,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Line {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    #[db("notnull")]
    pub invoice_id: i64,
    pub product: String,
    pub quantity: i32,
    #[db("relation: line_id")]
    pub notes: Vec<Note>,
}

impl Line {
    pub fn new(product: &str, quantity: i32) -> Self {
        Self {
            product: product.to_string(),
            quantity,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Note {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    #[gorp("line_id")]
    pub line_id: i64,
    pub text: String,
}

impl Note {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

/// A record whose hooks validate and decorate it.
#[derive(Debug, Default, Clone, PartialEq, Record)]
#[record(hooks)]
pub struct Account {
    #[db("primarykey, autoincrement")]
    pub id: i64,
    pub owner: String,
    #[db("-")]
    pub loaded: bool,
}

impl RecordHooks for Account {
    fn pre_insert(&mut self) -> HookResult {
        if self.owner.is_empty() {
            return Err("owner must not be empty".into());
        }
        Ok(())
    }

    fn post_get(&mut self) -> HookResult {
        self.loaded = true;
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Opens `DBMAP_TEST_DSN` when set, otherwise a fresh in-memory database.
pub async fn executor() -> SqliteExecutor {
    init_tracing();
    match std::env::var("DBMAP_TEST_DSN") {
        Ok(dsn) if !dsn.is_empty() => SqliteExecutor::connect(&dsn)
            .await
            .unwrap_or_else(|e| panic!("Failed to open {dsn}: {e}")),
        _ => SqliteExecutor::in_memory()
            .await
            .expect("Failed to open in-memory database"),
    }
}

/// A map with every test record registered and its tables recreated.
pub async fn setup() -> DbMap<SqliteExecutor> {
    let mut map = DbMap::new(SqliteDialect::new(), executor().await);
    map.register::<Person>().unwrap();
    map.register::<Invoice>().unwrap();
    map.register::<Line>().unwrap();
    map.register::<Note>().unwrap();
    map.register_with::<Account>(&TableOptions::new().table("accounts"))
        .unwrap();
    map.registry().validate().unwrap();
    map.drop_tables_if_exists().await.unwrap();
    map.create_tables().await.unwrap();
    map
}
