//! Idempotency record operations
//!
//! Inserts are the only write on the claim path. Conflicts on the
//! `(tenant_id, key)` primary key are reported as a value, every other
//! failure as an error.

use crate::DbPool;
use hookgate_core::{AppError, Timestamp};
use serde::Serialize;

/// Outcome of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written by this call
    Inserted,
    /// A row with the same tenant and key already existed
    Conflict,
}

/// A claimed operation slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdempotencyRecord {
    pub tenant_id: String,
    pub key: String,
    pub created_at: i64,
}

/// Inserts a record unless one with the same tenant and key exists
pub async fn insert_record(
    pool: &DbPool,
    tenant_id: &str,
    key: &str,
    created_at: Timestamp,
) -> Result<InsertOutcome, AppError> {
    let result = sqlx::query(
        "INSERT INTO idempotency_records (tenant_id, key, created_at) VALUES (?, ?, ?)",
    )
    .bind(tenant_id)
    .bind(key)
    .bind(created_at.as_millis())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(InsertOutcome::Conflict)
        }
        Err(e) => Err(map_write_error(pool, "insert idempotency record", e)),
    }
}

/// Gets a record by tenant and key
pub async fn get_record(
    pool: &DbPool,
    tenant_id: &str,
    key: &str,
) -> Result<Option<IdempotencyRecord>, AppError> {
    let row: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT tenant_id, key, created_at FROM idempotency_records WHERE tenant_id = ? AND key = ?",
    )
    .bind(tenant_id)
    .bind(key)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch idempotency record", e))?;

    Ok(row.map(|(tenant_id, key, created_at)| IdempotencyRecord {
        tenant_id,
        key,
        created_at,
    }))
}

/// Deletes a record, returning whether one existed
pub async fn delete_record(pool: &DbPool, tenant_id: &str, key: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM idempotency_records WHERE tenant_id = ? AND key = ?")
        .bind(tenant_id)
        .bind(key)
        .execute(pool)
        .await
        .map_err(|e| map_write_error(pool, "delete idempotency record", e))?;

    Ok(result.rows_affected() > 0)
}

/// Deletes every record created before `cutoff`
///
/// Returns the number of records removed.
pub async fn purge_expired(pool: &DbPool, cutoff: Timestamp) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM idempotency_records WHERE created_at < ?")
        .bind(cutoff.as_millis())
        .execute(pool)
        .await
        .map_err(|e| map_write_error(pool, "purge idempotency records", e))?;

    Ok(result.rows_affected())
}

/// Counts all records
pub async fn count_records(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_records")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count idempotency records", e))
}

/// Counts records for one tenant
pub async fn count_tenant_records(pool: &DbPool, tenant_id: &str) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM idempotency_records WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count idempotency records", e))
}

fn map_write_error(pool: &DbPool, operation: &str, err: sqlx::Error) -> AppError {
    let busy = matches!(
        &err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("5")
    );
    if busy {
        return AppError::DatabaseLocked {
            operation: operation.to_string(),
        };
    }
    if matches!(err, sqlx::Error::PoolTimedOut) {
        return AppError::StoreTimeout {
            operation: operation.to_string(),
            millis: acquire_timeout_millis(pool),
        };
    }
    AppError::database(format!("Failed to {}", operation), err)
}

fn acquire_timeout_millis(pool: &DbPool) -> u64 {
    u64::try_from(pool.options().get_acquire_timeout().as_millis()).unwrap_or(u64::MAX)
}
