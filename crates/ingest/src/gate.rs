//! Idempotency store gate
//!
//! `claim` is a single insert against the `(tenant_id, key)` uniqueness
//! constraint. The store arbitrates concurrent claimants; this type holds no
//! lock of its own. A conflict means another caller owns the operation.

use hookgate_core::AppError;
use hookgate_database::{IdempotencyStore, InsertOutcome};
use std::sync::Arc;

/// Result of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller holds the only right to perform the side effect
    Claimed,
    /// Someone else already claimed the operation; do not re-execute
    Duplicate,
}

/// Claim-or-detect-duplicate over an [`IdempotencyStore`]
#[derive(Clone)]
pub struct IdempotencyGate {
    store: Arc<dyn IdempotencyStore>,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }

    /// Attempts to claim `(tenant_id, key)`
    ///
    /// Store failures other than the uniqueness conflict are returned as
    /// errors and never read as a duplicate.
    pub async fn claim(&self, tenant_id: &str, key: &str) -> Result<ClaimOutcome, AppError> {
        match self.store.insert_if_absent(tenant_id, key).await? {
            InsertOutcome::Inserted => {
                log::debug!("claimed tenant={} key={}", tenant_id, key);
                Ok(ClaimOutcome::Claimed)
            }
            InsertOutcome::Conflict => {
                log::debug!("duplicate tenant={} key={}", tenant_id, key);
                Ok(ClaimOutcome::Duplicate)
            }
        }
    }

    /// Gives up a claim so a later request with the same key can succeed
    pub async fn release(&self, tenant_id: &str, key: &str) -> Result<bool, AppError> {
        let removed = self.store.remove(tenant_id, key).await?;
        if removed {
            log::info!("released claim tenant={} key={}", tenant_id, key);
        }
        Ok(removed)
    }

    /// Checks the backing store is reachable
    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await
    }
}
