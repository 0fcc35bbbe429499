// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant operations
//!
//! This module provides:
//! - Decorrelated-jitter backoff and an async retrier
//! - A circuit breaker with a single half-open trial
//! - A keyed fixed-window rate limiter
//! - Timeout handling
//!
//! # Example
//!
//! ```rust
//! use hookgate_resilience::{CircuitBreaker, CircuitBreakerConfig, Retrier, RetryPolicy};
//! use std::time::Duration;
//!
//! let retrier = Retrier::new(
//!     RetryPolicy::new(3).with_base_delay(Duration::from_millis(500)),
//! );
//!
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::new(5, Duration::from_secs(30)))
//!     .with_name("forwarder");
//! # let _ = (retrier, breaker);
//! ```

mod backoff;
mod circuit_breaker;
mod error;
mod rate_limiter;
mod retry;
mod timeout;

pub use backoff::{next_delay, DecorrelatedJitter};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitObserver, CircuitState, NoopCircuitObserver,
};
pub use error::{BreakerError, CircuitOpenError, ResilienceError, ResilienceResult, RetryError};
pub use rate_limiter::RateLimiter;
pub use retry::{NoopRetryObserver, Retrier, RetryLabels, RetryObserver, RetryPolicy};
pub use timeout::{with_timeout, Timeout};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: RetryPolicy = RetryPolicy::default();
        let _: Retrier = Retrier::new(RetryPolicy::default());
        let _: CircuitBreakerConfig = CircuitBreakerConfig::default();
        let _: CircuitBreaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let _: RateLimiter = RateLimiter::new(100, std::time::Duration::from_secs(1));
        let _: Timeout = Timeout::new(std::time::Duration::from_secs(5));
    }
}
