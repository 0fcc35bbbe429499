//! Error types and recovery strategies for hookgate
//!
//! Errors are classified into three severity tiers:
//! - **Recoverable**: the caller may retry later (store busy, downstream timeout)
//! - **Degraded**: one request or feature fails, the service keeps running
//! - **Fatal**: the process cannot serve correctly (corrupted store, failed migration)
//!
//! Each error carries a recovery action so callers can decide between retrying,
//! surfacing a hard failure, or stopping.

use std::fmt;
use std::io;
use thiserror::Error;

/// Recovery actions that can be taken when an error occurs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation immediately (e.g., a dropped connection)
    RetryImmediate,
    /// Retry with backoff (e.g., store locked, dependency unavailable)
    RetryWithBackoff,
    /// Reconcile out-of-band (e.g., a claimed operation failed downstream)
    Reconcile,
    /// Repair or restore the persistent store
    RepairDatabase,
    /// Perform a safe shutdown and require an operator restart
    SafeShutdown,
    /// No automatic recovery - operator or caller intervention required
    UserIntervention,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryImmediate => write!(f, "Retrying immediately"),
            Self::RetryWithBackoff => write!(f, "Retrying with backoff"),
            Self::Reconcile => write!(f, "Reconciliation required"),
            Self::RepairDatabase => write!(f, "Repairing database"),
            Self::SafeShutdown => write!(f, "Performing safe shutdown"),
            Self::UserIntervention => write!(f, "User intervention required"),
        }
    }
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Error can be automatically recovered from
    Recoverable,
    /// Request or feature degraded but the service continues
    Degraded,
    /// Critical error requiring restart or operator action
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "Recoverable"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

/// Main error type shared by the hookgate crates
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Persistence Errors =====
    /// Database operation failed
    #[error("Database error: {message}")]
    DatabaseError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database is locked or busy
    #[error("Database locked: {operation}")]
    DatabaseLocked { operation: String },

    /// Database is corrupted and needs repair
    #[error("Database corrupted: {details}")]
    DatabaseCorrupted { details: String },

    /// Database migration failed
    #[error("Migration failed: {version} - {reason}")]
    MigrationFailed { version: String, reason: String },

    /// Store did not answer within the allotted time
    #[error("Store unavailable: {operation} did not complete within {millis}ms")]
    StoreTimeout { operation: String, millis: u64 },

    // ===== Downstream Errors =====
    /// Outbound dependency failed
    #[error("Downstream error ({service}): {message}")]
    DownstreamError { service: String, message: String },

    /// Operation claimed its idempotency slot but failed afterwards
    #[error("Processing failed after claim for key {key}: {reason}")]
    ClaimedButFailed { key: String, reason: String },

    // ===== Configuration Errors =====
    /// Invalid configuration
    #[error("Invalid configuration: {setting} = '{value}' ({reason})")]
    InvalidConfiguration {
        setting: String,
        value: String,
        reason: String,
    },

    // ===== I/O Errors =====
    /// General I/O error
    #[error("I/O error: {message}")]
    IoError {
        message: String,
        #[source]
        source: io::Error,
    },

    // ===== Generic Errors =====
    /// Generic internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {argument} - {reason}")]
    InvalidArgument { argument: String, reason: String },
}

impl AppError {
    /// Returns the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DatabaseLocked { .. }
            | Self::StoreTimeout { .. }
            | Self::DownstreamError { .. } => ErrorSeverity::Recoverable,

            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => ErrorSeverity::Fatal,

            _ => ErrorSeverity::Degraded,
        }
    }

    /// Returns the recommended recovery action for this error
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::StoreTimeout { .. } => RecoveryAction::RetryImmediate,

            Self::DatabaseLocked { .. } | Self::DownstreamError { .. } => {
                RecoveryAction::RetryWithBackoff
            }

            Self::ClaimedButFailed { .. } => RecoveryAction::Reconcile,

            Self::DatabaseCorrupted { .. } => RecoveryAction::RepairDatabase,

            Self::MigrationFailed { .. } => RecoveryAction::SafeShutdown,

            _ => RecoveryAction::UserIntervention,
        }
    }

    /// Returns a message that is safe to hand to an external client
    ///
    /// Never includes raw persistence errors or downstream response bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError { .. }
            | Self::DatabaseLocked { .. }
            | Self::StoreTimeout { .. } => {
                "The event store is temporarily unavailable. Please retry later.".to_string()
            }
            Self::DatabaseCorrupted { .. } | Self::MigrationFailed { .. } => {
                "The service is not able to accept events right now.".to_string()
            }
            Self::DownstreamError { .. } => {
                "A downstream dependency failed. Please retry later.".to_string()
            }
            Self::ClaimedButFailed { .. } => {
                "The event was received but could not be processed.".to_string()
            }
            Self::InvalidConfiguration { setting, .. } => {
                format!("Invalid setting: {}. Please check your configuration.", setting)
            }
            Self::IoError { .. } | Self::InternalError { .. } => {
                "An unexpected error occurred.".to_string()
            }
            Self::InvalidArgument { argument, .. } => format!("Invalid input: {}", argument),
        }
    }

    /// Returns true if this error should be logged at ERROR level
    pub fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    /// Returns true if this error can be automatically retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::RetryImmediate | RecoveryAction::RetryWithBackoff
        )
    }

    /// Helper to create a database error from any error type
    pub fn database<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper to create a downstream error
    pub fn downstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownstreamError {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Helper to create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_recovery_action_display() {
        assert_eq!(
            RecoveryAction::RetryImmediate.to_string(),
            "Retrying immediately"
        );
        assert_eq!(
            RecoveryAction::RetryWithBackoff.to_string(),
            "Retrying with backoff"
        );
        assert_eq!(
            RecoveryAction::Reconcile.to_string(),
            "Reconciliation required"
        );
        assert_eq!(
            RecoveryAction::SafeShutdown.to_string(),
            "Performing safe shutdown"
        );
    }

    #[test]
    fn test_error_severity_ordering() {
        assert!(ErrorSeverity::Recoverable < ErrorSeverity::Degraded);
        assert!(ErrorSeverity::Degraded < ErrorSeverity::Fatal);
    }

    #[test]
    fn test_store_timeout_is_retryable() {
        let err = AppError::StoreTimeout {
            operation: "ping".to_string(),
            millis: 5000,
        };
        assert_eq!(err.severity(), ErrorSeverity::Recoverable);
        assert_eq!(err.recovery_action(), RecoveryAction::RetryImmediate);
        assert!(err.is_retryable());
        assert!(!err.is_critical());
    }

    #[test]
    fn test_database_corrupted_is_fatal() {
        let err = AppError::DatabaseCorrupted {
            details: "Invalid header".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
        assert_eq!(err.recovery_action(), RecoveryAction::RepairDatabase);
        assert!(!err.is_retryable());
        assert!(err.is_critical());
    }

    #[test]
    fn test_claimed_but_failed_needs_reconciliation() {
        let err = AppError::ClaimedButFailed {
            key: "k".to_string(),
            reason: "downstream 500".to_string(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::Reconcile);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let inner = io::Error::new(io::ErrorKind::Other, "SQLITE_BUSY: database is locked");
        let err = AppError::database("insert idempotency record", inner);
        let msg = err.user_message();
        assert!(!msg.contains("SQLITE"));
        assert!(msg.contains("store"));
    }

    #[test]
    fn test_database_helper_keeps_source() {
        let inner = io::Error::new(io::ErrorKind::Other, "disk I/O error");
        let err = AppError::database("Query failed", inner);

        assert!(matches!(err, AppError::DatabaseError { .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "Unknown error");
        let app_err: AppError = io_err.into();

        assert!(matches!(app_err, AppError::IoError { .. }));
    }

    #[test]
    fn test_downstream_display() {
        let err = AppError::downstream("forwarder", "HTTP 503");
        let display = err.to_string();
        assert!(display.contains("forwarder"));
        assert!(display.contains("503"));
    }
}
