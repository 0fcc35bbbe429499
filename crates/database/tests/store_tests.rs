//! Concurrency tests against a file-backed database with a real pool

use hookgate_database::{
    connect, queries, run_migrations, DatabaseConfig, IdempotencyStore, InsertOutcome,
    SqliteIdempotencyStore,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn file_store(dir: &TempDir) -> SqliteIdempotencyStore {
    let path = dir.path().join("claims.db").to_string_lossy().into_owned();
    let pool = connect(DatabaseConfig::new(path).with_max_connections(8))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    SqliteIdempotencyStore::new(pool)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_have_single_winner() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(file_store(&dir).await);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert_if_absent("tenant", "same-key").await
        }));
    }

    let mut inserted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            InsertOutcome::Inserted => inserted += 1,
            InsertOutcome::Conflict => conflicts += 1,
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(queries::count_records(store.pool()).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_all_win() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(file_store(&dir).await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert_if_absent("tenant", &format!("key-{}", i)).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), InsertOutcome::Inserted);
    }
    assert_eq!(queries::count_records(store.pool()).await.unwrap(), 10);
}

#[tokio::test]
async fn test_records_survive_reconnect() {
    let dir = TempDir::new().unwrap();
    {
        let store = file_store(&dir).await;
        store.insert_if_absent("tenant", "durable").await.unwrap();
        store.pool().close().await;
    }

    let store = file_store(&dir).await;
    assert_eq!(
        store.insert_if_absent("tenant", "durable").await.unwrap(),
        InsertOutcome::Conflict
    );
}
