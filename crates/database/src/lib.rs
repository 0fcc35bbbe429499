//! hookgate persistence layer
//!
//! SQLite through sqlx. The only table on the hot path is
//! `idempotency_records`, whose primary key arbitrates concurrent claims.

pub mod connection;
pub mod migrations;
pub mod queries;
pub mod store;

pub use connection::{connect, connect_in_memory, ping, DatabaseConfig, DbPool};
pub use migrations::{applied_version, current_version, optimize, run_migrations, verify_integrity};
pub use queries::{IdempotencyRecord, InsertOutcome};
pub use store::{IdempotencyStore, SqliteIdempotencyStore};

#[cfg(test)]
mod tests {
    use super::*;
    use connection::create_test_db;
    use hookgate_core::{AppError, Timestamp};

    #[tokio::test]
    async fn test_database_migrations() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .map_err(|e| AppError::database("Failed to count migrations", e))?;

        assert!(count > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_claim_workflow() -> Result<(), AppError> {
        let pool = create_test_db().await?;
        run_migrations(&pool).await?;

        let outcome = queries::insert_record(&pool, "tenant", "evt-1", Timestamp::now()).await?;
        assert_eq!(outcome, InsertOutcome::Inserted);

        let record = queries::get_record(&pool, "tenant", "evt-1").await?;
        assert_eq!(record.map(|r| r.key), Some("evt-1".to_string()));

        verify_integrity(&pool).await?;
        Ok(())
    }
}
