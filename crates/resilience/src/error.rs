// crates/resilience/src/error.rs
//! Error types for resilience operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Type-erased errors produced by the resilience primitives
///
/// The generic [`RetryError`] and [`BreakerError`] convert into this type when
/// the caller only needs a message and a category.
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// All retry attempts exhausted
    #[error("All {attempts} retry attempts exhausted: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// Circuit breaker is open
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Rate limit exceeded
    #[error("Rate limit exceeded (limit: {limit} per {window:?})")]
    RateLimitExceeded { limit: usize, window: Duration },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Returned when a call is rejected by an open circuit
///
/// No attempt was made against the guarded resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker is open (failures: {failures}, retry in {retry_in:?})")]
pub struct CircuitOpenError {
    /// Consecutive failures recorded when the call was rejected
    pub failures: usize,
    /// Time left until a trial call will be admitted
    pub retry_in: Duration,
}

/// Failure of a [`Retrier`](crate::Retrier) invocation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last underlying error
    #[error("All {attempts} retry attempts exhausted: {last_error}")]
    Exhausted { attempts: usize, last_error: E },

    /// The caller classified the failure as not worth retrying
    #[error("Non-retryable failure on attempt {attempt}: {error}")]
    Aborted { attempt: usize, error: E },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> usize {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// Borrows the last underlying error
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }

    /// Unwraps the last underlying error
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Failure of a call made through a [`CircuitBreaker`](crate::CircuitBreaker)
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without invoking the operation
    #[error(transparent)]
    Open(CircuitOpenError),

    /// The operation ran and failed
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected by an open circuit
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl<E: fmt::Display> From<RetryError<E>> for ResilienceError {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => Self::RetriesExhausted {
                attempts,
                last_error: last_error.to_string(),
            },
            RetryError::Aborted { error, .. } => Self::Custom(error.to_string()),
        }
    }
}

impl<E: fmt::Display> From<BreakerError<E>> for ResilienceError {
    fn from(err: BreakerError<E>) -> Self {
        match err {
            BreakerError::Open(open) => Self::CircuitOpen(open),
            BreakerError::Inner(inner) => Self::Custom(inner.to_string()),
        }
    }
}
