//! Store port consumed by the idempotency gate

use crate::connection::{self, DbPool};
use crate::queries::{self, InsertOutcome};
use async_trait::async_trait;
use hookgate_core::{AppError, Timestamp};

/// Persistent relation with a uniqueness constraint on `(tenant_id, key)`
///
/// `insert_if_absent` must be atomic with respect to every other caller,
/// including callers in other processes.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Writes the record, or reports that it already exists
    async fn insert_if_absent(&self, tenant_id: &str, key: &str)
        -> Result<InsertOutcome, AppError>;

    /// Removes a record; returns whether one existed
    async fn remove(&self, tenant_id: &str, key: &str) -> Result<bool, AppError>;

    /// Checks the store is reachable
    async fn ping(&self) -> Result<(), AppError>;
}

/// [`IdempotencyStore`] backed by the SQLite `idempotency_records` table
#[derive(Debug, Clone)]
pub struct SqliteIdempotencyStore {
    pool: DbPool,
}

impl SqliteIdempotencyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Deletes records older than `cutoff`
    pub async fn purge_expired(&self, cutoff: Timestamp) -> Result<u64, AppError> {
        queries::purge_expired(&self.pool, cutoff).await
    }
}

#[async_trait]
impl IdempotencyStore for SqliteIdempotencyStore {
    async fn insert_if_absent(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<InsertOutcome, AppError> {
        queries::insert_record(&self.pool, tenant_id, key, Timestamp::now()).await
    }

    async fn remove(&self, tenant_id: &str, key: &str) -> Result<bool, AppError> {
        queries::delete_record(&self.pool, tenant_id, key).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        connection::ping(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_store_through_trait_object() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store: Arc<dyn IdempotencyStore> = Arc::new(SqliteIdempotencyStore::new(pool));

        store.ping().await.unwrap();
        assert_eq!(
            store.insert_if_absent("t", "k").await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_if_absent("t", "k").await.unwrap(),
            InsertOutcome::Conflict
        );
        assert!(store.remove("t", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_records() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqliteIdempotencyStore::new(pool);

        store.insert_if_absent("t", "k").await.unwrap();
        let removed = store
            .purge_expired(Timestamp::from_millis(0))
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert_eq!(queries::count_records(store.pool()).await.unwrap(), 1);
    }
}
