// crates/resilience/src/retry.rs
//! Retry policies with decorrelated-jitter backoff

use crate::backoff::next_delay;
use crate::error::RetryError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first attempt)
    max_attempts: usize,
    /// Lower bound of every delay
    base_delay: Duration,
    /// Upper bound of every delay
    max_delay: Duration,
    /// Whether to randomize delays
    use_jitter: bool,
}

impl RetryPolicy {
    /// Creates a new retry policy
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            use_jitter: true,
        }
    }

    /// Sets the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets whether to use jitter
    ///
    /// Without jitter the delay doubles each time, capped at the maximum.
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Returns the maximum number of attempts (never less than one)
    pub fn max_attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Returns the base delay
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the maximum delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Caller-supplied classification attached to retry metrics
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetryLabels {
    pub tenant: String,
    pub service: String,
}

impl RetryLabels {
    pub fn new(tenant: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            service: service.into(),
        }
    }
}

impl Default for RetryLabels {
    fn default() -> Self {
        Self::new("unknown", "generic")
    }
}

/// Receives a callback for every failed attempt
///
/// Implemented by the metrics layer; the retrier itself never touches a
/// metrics backend.
pub trait RetryObserver: Send + Sync {
    /// `next_delay` is `None` when no further attempt will be made
    fn on_failed_attempt(&self, labels: &RetryLabels, attempt: usize, next_delay: Option<Duration>);
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRetryObserver;

impl RetryObserver for NoopRetryObserver {
    fn on_failed_attempt(&self, _: &RetryLabels, _: usize, _: Option<Duration>) {}
}

/// Runs async operations under a [`RetryPolicy`]
///
/// Sleeps between attempts with `tokio::time::sleep`, so only the calling
/// task is suspended.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
    rng: Option<Arc<Mutex<StdRng>>>,
}

impl Retrier {
    /// Creates a retrier using the thread-local random source
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopRetryObserver),
            rng: None,
        }
    }

    /// Attaches an observer notified on every failed attempt
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Uses a seeded random source, making delays reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    /// Returns the policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `operation`, retrying every failure up to the attempt bound
    pub async fn execute<F, Fut, T, E>(
        &self,
        labels: &RetryLabels,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.execute_if(labels, operation, |_| true).await
    }

    /// Executes `operation`, retrying only failures for which `is_retryable` is true
    ///
    /// A non-retryable failure is returned immediately as [`RetryError::Aborted`].
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        labels: &RetryLabels,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.policy.max_attempts();
        let mut current_delay = self.policy.base_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_retryable(&error) {
                self.observer.on_failed_attempt(labels, attempt, None);
                return Err(RetryError::Aborted { attempt, error });
            }

            if attempt >= max_attempts {
                self.observer.on_failed_attempt(labels, attempt, None);
                log::warn!(
                    "giving up after {} attempts (service={} tenant={}): {}",
                    attempt,
                    labels.service,
                    labels.tenant,
                    error
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.next_delay(current_delay);
            current_delay = delay;
            self.observer.on_failed_attempt(labels, attempt, Some(delay));
            log::warn!(
                "attempt {}/{} failed (service={} tenant={}): {}; retrying in {}ms",
                attempt,
                max_attempts,
                labels.service,
                labels.tenant,
                error,
                delay.as_millis()
            );

            tokio::time::sleep(delay).await;
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let policy = &self.policy;
        if !policy.use_jitter {
            return current.saturating_mul(2).min(policy.max_delay).max(policy.base_delay);
        }

        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                next_delay(policy.base_delay, current, policy.max_delay, &mut *rng)
            }
            None => next_delay(
                policy.base_delay,
                current,
                policy.max_delay,
                &mut rand::thread_rng(),
            ),
        }
    }
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("seeded", &self.rng.is_some())
            .finish()
    }
}
