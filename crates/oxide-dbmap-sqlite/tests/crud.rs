mod common;

use chrono::{TimeZone, Utc};
use common::{setup, Account, Person};
use oxide_dbmap::{DbMapError, SqlValue};

#[tokio::test]
async fn insert_assigns_generated_keys() {
    let map = setup().await;
    let mut ada = Person::new("Ada", "Lovelace", "ada@example.com");
    let mut alan = Person::new("Alan", "Turing", "alan@example.com");
    map.insert(&mut ada).await.unwrap();
    map.insert(&mut alan).await.unwrap();
    assert_eq!(ada.id, 1);
    assert_eq!(alan.id, 2);
}

#[tokio::test]
async fn get_round_trips_every_column() {
    let map = setup().await;
    let joined = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
    let mut ada = Person {
        age: Some(36),
        joined: Some(joined),
        display: "not persisted".to_string(),
        ..Person::new("Ada", "Lovelace", "ada@example.com")
    };
    map.insert(&mut ada).await.unwrap();

    let loaded: Person = map.get(&[SqlValue::Int(ada.id)]).await.unwrap().unwrap();
    assert_eq!(loaded.first, "Ada");
    assert_eq!(loaded.age, Some(36));
    assert_eq!(loaded.joined, Some(joined));
    assert_eq!(loaded.display, "");

    let missing: Option<Person> = map.get(&[SqlValue::Int(99)]).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn update_and_delete_report_affected_rows() {
    let map = setup().await;
    let mut ada = Person::new("Ada", "Lovelace", "ada@example.com");
    map.insert(&mut ada).await.unwrap();

    ada.last = "King".to_string();
    ada.age = None;
    assert_eq!(map.update(&mut ada).await.unwrap(), 1);
    let loaded: Person = map.get(&[SqlValue::Int(ada.id)]).await.unwrap().unwrap();
    assert_eq!(loaded.last, "King");
    assert_eq!(loaded.age, None);

    assert_eq!(map.delete(&mut ada).await.unwrap(), 1);
    assert_eq!(map.delete(&mut ada).await.unwrap(), 0);
    assert_eq!(map.update(&mut ada).await.unwrap(), 0);
}

#[tokio::test]
async fn unique_constraint_surfaces_as_execution_error() {
    let map = setup().await;
    // The email column is unique through its own index.
    map.create_indexes().await.unwrap();
    map.insert(&mut Person::new("Ada", "Lovelace", "same@example.com"))
        .await
        .unwrap();
    let err = map
        .insert(&mut Person::new("Alan", "Turing", "same@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbMapError::Execution { .. }));
}

#[tokio::test]
async fn raw_queries_map_columns_onto_fields() {
    let map = setup().await;
    for (first, age) in [("Ada", 36), ("Alan", 41), ("Grace", 85)] {
        let mut person = Person {
            age: Some(age),
            ..Person::new(first, "X", &format!("{first}@example.com"))
        };
        map.insert(&mut person).await.unwrap();
    }

    let older: Vec<Person> = map
        .select(
            "SELECT * FROM \"Person\" WHERE \"age\" > ? ORDER BY \"id\";",
            &[SqlValue::Int(40)],
        )
        .await
        .unwrap();
    let names: Vec<_> = older.iter().map(|p| p.first.as_str()).collect();
    assert_eq!(names, vec!["Alan", "Grace"]);

    let partial: Option<Person> = map
        .select_one(
            "SELECT id, FIRST_NAME, 1 AS extra FROM Person WHERE id = 1;",
            &[],
        )
        .await
        .unwrap();
    let partial = partial.unwrap();
    assert_eq!(partial.first, "Ada");
    assert_eq!(partial.email, "");

    assert_eq!(
        map.select_int("SELECT COUNT(*) FROM Person;", &[])
            .await
            .unwrap(),
        3
    );
    assert_eq!(
        map.select_int("SELECT age FROM Person WHERE id = 42;", &[])
            .await
            .unwrap(),
        0
    );
    assert_eq!(map.select_opt_int("SELECT NULL;", &[]).await.unwrap(), None);
    assert_eq!(
        map.select_float("SELECT AVG(age) FROM Person WHERE age < 50;", &[])
            .await
            .unwrap(),
        38.5
    );
    assert_eq!(
        map.select_str(
            "SELECT first_name FROM Person WHERE id = ?;",
            &[SqlValue::Int(3)],
        )
        .await
        .unwrap(),
        "Grace"
    );
    assert_eq!(map.select_opt_str("SELECT NULL;", &[]).await.unwrap(), None);
}

#[tokio::test]
async fn hooks_veto_and_decorate() {
    let map = setup().await;

    let err = map.insert(&mut Account::default()).await.unwrap_err();
    assert!(matches!(err, DbMapError::Hook { hook: "pre_insert", .. }));
    assert_eq!(
        map.select_int("SELECT COUNT(*) FROM accounts;", &[])
            .await
            .unwrap(),
        0
    );

    let mut account = Account {
        owner: "ada".to_string(),
        ..Account::default()
    };
    map.insert(&mut account).await.unwrap();
    let loaded: Account = map
        .get(&[SqlValue::Int(account.id)])
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.loaded);
    assert_eq!(loaded.owner, "ada");
}

#[tokio::test]
async fn ddl_guards_are_idempotent() {
    let map = setup().await;
    map.create_tables_if_not_exists().await.unwrap();
    map.insert(&mut Person::new("Ada", "Lovelace", "ada@example.com"))
        .await
        .unwrap();

    map.truncate_tables().await.unwrap();
    assert_eq!(
        map.select_int("SELECT COUNT(*) FROM Person;", &[])
            .await
            .unwrap(),
        0
    );

    map.drop_tables().await.unwrap();
    map.drop_tables_if_exists().await.unwrap();
    let err = map.drop_tables().await.unwrap_err();
    assert!(matches!(err, DbMapError::Execution { .. }));
}
