mod common;

use common::{executor, setup, Person};
use oxide_dbmap::{DbMap, SqliteDialect, TableOptions};
use oxide_dbmap_sqlite::SqliteExecutor;

async fn person_indexes(map: &DbMap<SqliteExecutor>) -> Vec<String> {
    let rows = map
        .select_str(
            "SELECT group_concat(name, ',') FROM (SELECT name FROM sqlite_master \
             WHERE type = 'index' AND tbl_name = 'Person' AND sql IS NOT NULL ORDER BY name);",
            &[],
        )
        .await
        .unwrap();
    rows.split(',')
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[tokio::test]
async fn sync_creates_declared_indexes_once() {
    let map = setup().await;
    assert!(person_indexes(&map).await.is_empty());

    let reports = map.sync_indexes().await;
    assert_eq!(reports.len(), 5);
    let person = reports.iter().find(|r| r.table_name == "Person").unwrap();
    let plan = person.outcome.as_ref().unwrap();
    assert_eq!(plan.creates.len(), 2);
    assert!(plan.drops.is_empty());
    assert_eq!(
        person_indexes(&map).await,
        vec!["ix_Person_by_email", "ix_Person_by_name"]
    );

    for report in map.sync_indexes().await {
        assert!(
            report.outcome.unwrap().is_empty(),
            "{} not converged",
            report.table_name
        );
    }
}

#[tokio::test]
async fn sync_drops_obsolete_and_rebuilds_changed_indexes() {
    let map = setup().await;
    map.sync_indexes().await;
    map.exec("CREATE INDEX legacy_last ON Person (last);", &[])
        .await
        .unwrap();
    map.exec("DROP INDEX ix_Person_by_name;", &[])
        .await
        .unwrap();
    map.exec("CREATE INDEX ix_Person_by_name ON Person (last);", &[])
        .await
        .unwrap();

    let reports = map.sync_indexes().await;
    let person = reports.iter().find(|r| r.table_name == "Person").unwrap();
    let plan = person.outcome.as_ref().unwrap();
    let drops: Vec<_> = plan.drops.iter().map(|c| c.index_name.as_str()).collect();
    assert_eq!(drops, vec!["legacy_last", "ix_Person_by_name"]);
    let creates: Vec<_> = plan.creates.iter().map(|c| c.index_name.as_str()).collect();
    assert_eq!(creates, vec!["ix_Person_by_name"]);

    let columns = map
        .select_str(
            "SELECT group_concat(name, ',') FROM pragma_index_info('ix_Person_by_name');",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(columns, "first_name,last");
}

#[tokio::test]
async fn api_declared_indexes_join_the_declared_set() {
    let mut map = DbMap::new(SqliteDialect::new(), executor().await);
    map.register_with::<Person>(&TableOptions::new().unique_index("by_age", &["age", "last"]))
        .unwrap();
    map.create_tables().await.unwrap();

    let statements = map.create_index_statements().unwrap();
    assert!(statements.contains(
        &"CREATE UNIQUE INDEX \"ix_Person_by_age\" ON \"Person\" (\"age\", \"last\");".to_string()
    ));

    for report in map.sync_indexes().await {
        report.outcome.unwrap();
    }
    assert_eq!(
        person_indexes(&map).await,
        vec![
            "ix_Person_by_age",
            "ix_Person_by_email",
            "ix_Person_by_name",
        ]
    );
}
