// crates/network/src/error.rs
//! Error types for outbound calls

use hookgate_resilience::{CircuitOpenError, ResilienceError};
use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur during outbound calls
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (connect, TLS, body, timeout inside reqwest)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The peer answered with a non-success status
    #[error("HTTP {status} from downstream")]
    Status { status: u16, body: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The circuit guarding the dependency is open; nothing was sent
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Every attempt failed with a retryable error
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: usize,
        last_error: Box<NetworkError>,
    },

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl NetworkError {
    /// Returns true if another attempt could succeed
    ///
    /// Transport errors, 5xx and 429 are retryable; other 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.status().map(is_retryable_status).unwrap_or(true),
            Self::Status { status, .. } => is_retryable_status_code(*status),
            Self::Timeout => true,
            _ => false,
        }
    }

    /// Returns true if the error is a client error (4xx other than 429)
    pub fn is_client_error(&self) -> bool {
        self.status()
            .map(|s| (400..500).contains(&s) && s != 429)
            .unwrap_or(false)
    }

    /// Returns true if the error is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status().map(|s| s >= 500).unwrap_or(false)
    }

    /// Returns true if the call was rejected without reaching the peer
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    is_retryable_status_code(status.as_u16())
}

fn is_retryable_status_code(status: u16) -> bool {
    status >= 500 || status == 429
}

impl From<ResilienceError> for NetworkError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::CircuitOpen(open) => Self::CircuitOpen(open),
            ResilienceError::Timeout(_) => Self::Timeout,
            other => Self::Custom(other.to_string()),
        }
    }
}
