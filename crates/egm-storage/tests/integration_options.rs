//! Options persistence across database reopen.

use chrono::{DateTime, Utc};
use egm_core::{DeviceOptions, OptionsKey, OptionsStore};
use egm_storage::{Database, SqliteOptionsStore};
use rstest::rstest;

async fn open(path: &str) -> (Database, SqliteOptionsStore) {
    let db = Database::open(path).await.unwrap();
    let store = SqliteOptionsStore::new(db.pool().clone());
    (db, store)
}

#[tokio::test]
async fn test_options_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.db");
    let path = path.to_str().unwrap();
    let key = OptionsKey::new("PrinterOptions", 1);
    let activated: DateTime<Utc> = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    {
        let (db, store) = open(path).await;
        let mut options = store
            .load_or_create(&key, &DeviceOptions::new("template"))
            .await
            .unwrap();
        options.activation_time = Some(activated);
        store.save(&key, &options).await.unwrap();
        db.close().await;
    }

    let (db, store) = open(path).await;
    let loaded = store
        .load_or_create(&key, &DeviceOptions::new("text"))
        .await
        .unwrap();
    assert_eq!(loaded.render_target, "template");
    assert_eq!(loaded.activation_time, Some(activated));
    db.close().await;
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
#[tokio::test]
async fn test_blocks_are_keyed_by_index(#[case] index: u8) {
    let db = Database::in_memory().await.unwrap();
    let store = SqliteOptionsStore::new(db.pool().clone());

    let mine = OptionsKey::new("PrinterOptions", index);
    store
        .save(&mine, &DeviceOptions::new(format!("target-{}", index)))
        .await
        .unwrap();

    let other = OptionsKey::new("PrinterOptions", index + 1);
    let loaded = store
        .load_or_create(&other, &DeviceOptions::new("template"))
        .await
        .unwrap();
    assert_eq!(loaded.render_target, "template");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM device_options")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let (applied,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}
