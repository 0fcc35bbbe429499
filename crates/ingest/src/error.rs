//! Ingestion failures and their client-facing shape
//!
//! Every variant maps to an HTTP status, a stable machine-readable code and a
//! message that is safe to return to the sender. Anything more detailed stays
//! in the server log.

use hookgate_core::AppError;
use std::time::Duration;
use thiserror::Error;

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

/// Why an inbound event was not accepted
#[derive(Debug, Error)]
pub enum IngestError {
    /// Admission denied by the rate limiter
    #[error("rate limit of {limit} requests exceeded")]
    RateLimited { limit: usize, retry_after: Duration },

    /// No secret is configured for the source
    #[error("unknown source '{name}'")]
    UnknownSource { name: String },

    /// The request carried no signature
    #[error("missing signature")]
    MissingSignature,

    /// The signature did not verify
    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    /// The body is not a JSON object
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// The idempotency store failed for a reason other than a duplicate
    #[error("idempotency store failed: {0}")]
    Store(#[source] AppError),

    /// A dependency is known to be down; nothing was sent
    #[error("dependency unavailable: {reason}")]
    DependencyUnavailable { reason: String },

    /// A dependency kept failing after retries
    #[error("downstream failed: {reason}")]
    DownstreamFailed { reason: String },

    /// Processing failed after the claim
    #[error("processing failed: {reason}")]
    ProcessingFailed { reason: String },
}

impl IngestError {
    /// HTTP status for the response
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RateLimited { .. } => 429,
            Self::UnknownSource { .. } => 403,
            Self::MissingSignature | Self::InvalidSignature { .. } => 401,
            Self::InvalidBody { .. } => 400,
            Self::DependencyUnavailable { .. } => 503,
            Self::DownstreamFailed { .. } => 502,
            Self::Store(_) | Self::ProcessingFailed { .. } => 500,
        }
    }

    /// Stable error code for the `error` field
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::UnknownSource { .. } => "unknown_source",
            Self::MissingSignature => "missing_signature",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::InvalidBody { .. } => "invalid_body",
            Self::Store(_) => "store_unavailable",
            Self::DependencyUnavailable { .. } => "dependency_unavailable",
            Self::DownstreamFailed { .. } => "downstream_failed",
            Self::ProcessingFailed { .. } => "processing_failed",
        }
    }

    /// Message that is safe to return to the sender
    pub fn client_message(&self) -> String {
        match self {
            Self::RateLimited { retry_after, .. } => format!(
                "Too many requests. Retry after {} seconds.",
                retry_after_secs(*retry_after)
            ),
            Self::UnknownSource { name } => format!("Source '{}' is not configured.", name),
            Self::MissingSignature => "A request signature is required.".to_string(),
            Self::InvalidSignature { .. } => "The request signature is not valid.".to_string(),
            Self::InvalidBody { .. } => "The request body must be a JSON object.".to_string(),
            Self::Store(err) => err.user_message(),
            Self::DependencyUnavailable { .. } => {
                "A downstream dependency is unavailable. Please retry later.".to_string()
            }
            Self::DownstreamFailed { .. } => {
                "A downstream dependency failed. Please retry later.".to_string()
            }
            Self::ProcessingFailed { .. } => {
                "The event was received but could not be processed.".to_string()
            }
        }
    }

    /// `Retry-After` hint, when the sender should wait before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns true for rejections made before any idempotency claim
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::UnknownSource { .. }
                | Self::MissingSignature
                | Self::InvalidSignature { .. }
                | Self::InvalidBody { .. }
        )
    }
}

/// Whole seconds for a `Retry-After` header: rounded up, at least one
pub fn retry_after_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

impl From<AppError> for IngestError {
    fn from(err: AppError) -> Self {
        Self::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let rate_limited = IngestError::RateLimited {
            limit: 100,
            retry_after: Duration::from_secs(900),
        };
        assert_eq!(rate_limited.status_code(), 429);
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(900)));

        assert_eq!(
            IngestError::UnknownSource {
                name: "x".to_string()
            }
            .status_code(),
            403
        );
        assert_eq!(IngestError::MissingSignature.status_code(), 401);
        assert_eq!(
            IngestError::DependencyUnavailable {
                reason: "open".to_string()
            }
            .status_code(),
            503
        );
    }

    #[test]
    fn test_store_error_hides_detail() {
        let err: IngestError =
            AppError::database("insert", std::io::Error::other("SQLITE_IOERR disk")).into();

        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "store_unavailable");
        assert!(!err.client_message().contains("SQLITE"));
        assert!(!err.is_admission_error());
    }

    #[test]
    fn test_invalid_signature_message_hides_reason() {
        let err = IngestError::InvalidSignature {
            reason: "timestamp is 9000s away".to_string(),
        };
        assert!(!err.client_message().contains("9000"));
        assert!(err.is_admission_error());
    }

    #[test]
    fn test_retry_after_secs() {
        assert_eq!(retry_after_secs(Duration::from_secs(900)), 900);
        assert_eq!(retry_after_secs(Duration::from_millis(50)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }
}
