//! Shared error and value types for the hookgate ingestion crates

pub mod error;
pub mod types;

pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{TenantId, Timestamp};
