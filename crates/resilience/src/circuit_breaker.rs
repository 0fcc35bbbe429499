// crates/resilience/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! `Closed -> Open` after `failure_threshold` consecutive failures,
//! `Open -> HalfOpen` once `reset_timeout` has elapsed since the last failure,
//! and `HalfOpen -> Closed | Open` on the outcome of a single trial call.
//! While the trial is in flight every other caller is rejected.

use crate::error::{BreakerError, CircuitOpenError};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, one trial request decides the next state
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    failure_threshold: usize,
    /// Duration to wait after the last failure before admitting a trial
    reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration
    pub fn new(failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
        }
    }

    /// Failure threshold (never less than one)
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold.max(1)
    }

    /// Reset timeout
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

/// Receives every state transition of a [`CircuitBreaker`]
///
/// Called after the breaker's lock is released.
pub trait CircuitObserver: Send + Sync {
    fn on_transition(&self, breaker: &str, from: CircuitState, to: CircuitState);
}

/// Observer that ignores transitions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCircuitObserver;

impl CircuitObserver for NoopCircuitObserver {
    fn on_transition(&self, _breaker: &str, _from: CircuitState, _to: CircuitState) {}
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    /// Bumped on every transition; outcomes admitted under an older
    /// generation never move the state machine
    generation: u64,
    consecutive_failures: usize,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
}

type Transition = Option<(CircuitState, CircuitState)>;

impl CircuitBreakerState {
    fn transition(&mut self, to: CircuitState) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        Some((from, to))
    }
}

/// Ticket handed out by admission
#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
    trial: bool,
}

/// Circuit breaker guarding one dependency
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<CircuitBreakerState>>,
    observer: Arc<dyn CircuitObserver>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from("default"),
            config,
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                generation: 0,
                consecutive_failures: 0,
                last_failure_time: None,
                trial_in_flight: false,
            })),
            observer: Arc::new(NoopCircuitObserver),
        }
    }

    /// Names the breaker for log output
    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    /// Reports every state transition to `observer`
    ///
    /// Set this before cloning; clones made earlier keep their observer.
    pub fn with_observer(mut self, observer: Arc<dyn CircuitObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, transition: Transition) {
        if let Some((from, to)) = transition {
            self.observer.on_transition(&self.name, from, to);
        }
    }

    /// Gets the current state
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Gets the number of consecutive failures
    pub fn consecutive_failures(&self) -> usize {
        self.lock().consecutive_failures
    }

    /// Checks if a request can proceed
    ///
    /// Admitting the half-open trial marks it in flight; the caller must
    /// report the outcome through [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn can_proceed(&self) -> Result<(), CircuitOpenError> {
        self.admit().map(|_| ())
    }

    fn admit(&self) -> Result<Admission, CircuitOpenError> {
        let mut state = self.lock();
        let mut transition = None;

        let admitted = match state.state {
            CircuitState::Closed => Ok(Admission {
                generation: state.generation,
                trial: false,
            }),
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    Err(CircuitOpenError {
                        failures: state.consecutive_failures,
                        retry_in: Duration::ZERO,
                    })
                } else {
                    state.trial_in_flight = true;
                    Ok(Admission {
                        generation: state.generation,
                        trial: true,
                    })
                }
            }
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(self.config.reset_timeout);

                if elapsed >= self.config.reset_timeout {
                    transition = state.transition(CircuitState::HalfOpen);
                    state.trial_in_flight = true;
                    log::info!("circuit '{}' half-open, admitting trial call", self.name);
                    Ok(Admission {
                        generation: state.generation,
                        trial: true,
                    })
                } else {
                    Err(CircuitOpenError {
                        failures: state.consecutive_failures,
                        retry_in: self.config.reset_timeout - elapsed,
                    })
                }
            }
        };

        drop(state);
        self.notify(transition);
        admitted
    }

    /// Records a successful operation
    ///
    /// Closes a half-open circuit. An open circuit only closes through a
    /// trial, so a success reported while open is ignored.
    pub fn record_success(&self) {
        let generation = self.lock().generation;
        self.success_at(generation);
    }

    /// Records a failed operation
    pub fn record_failure(&self) {
        let generation = self.lock().generation;
        self.failure_at(generation);
    }

    fn success_at(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("circuit '{}' ignoring stale success", self.name);
            return;
        }

        let transition = match state.state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                state.consecutive_failures = 0;
                state.trial_in_flight = false;
                log::info!("circuit '{}' closed", self.name);
                state.transition(CircuitState::Closed)
            }
            CircuitState::Open => None,
        };

        drop(state);
        self.notify(transition);
    }

    fn failure_at(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("circuit '{}' ignoring stale failure", self.name);
            return;
        }

        state.consecutive_failures += 1;
        state.last_failure_time = Some(Instant::now());

        let transition = match state.state {
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold() {
                    log::warn!(
                        "circuit '{}' opened after {} consecutive failures",
                        self.name,
                        state.consecutive_failures
                    );
                    state.transition(CircuitState::Open)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                state.trial_in_flight = false;
                log::warn!("circuit '{}' trial failed, reopening", self.name);
                state.transition(CircuitState::Open)
            }
            CircuitState::Open => None,
        };

        drop(state);
        self.notify(transition);
    }

    /// Executes an async operation through the circuit breaker
    ///
    /// Every error counts as a failure.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Executes an async operation, counting only errors for which
    /// `counts_as_failure` is true
    ///
    /// An error that does not count is treated as proof the dependency is
    /// reachable and recorded as a success. Outcomes of calls admitted before
    /// the last transition are discarded.
    pub async fn call_with<F, Fut, T, E, P>(
        &self,
        operation: F,
        counts_as_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let admission = self.admit().map_err(BreakerError::Open)?;

        let mut guard = TrialGuard {
            breaker: self,
            admission,
            armed: admission.trial,
        };
        let result = operation().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.success_at(admission.generation);
                Ok(value)
            }
            Err(e) => {
                if counts_as_failure(&e) {
                    self.failure_at(admission.generation);
                } else {
                    self.success_at(admission.generation);
                }
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Resets the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.lock();
        state.consecutive_failures = 0;
        state.last_failure_time = None;
        state.trial_in_flight = false;
        let transition = if state.state == CircuitState::Closed {
            None
        } else {
            state.transition(CircuitState::Closed)
        };

        drop(state);
        self.notify(transition);
    }

    fn release_trial(&self, admission: Admission) {
        let mut state = self.lock();
        if state.generation == admission.generation {
            state.trial_in_flight = false;
        }
    }
}

/// Frees the half-open slot if the trial future is dropped before completing
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.release_trial(self.admission);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn open_breaker(threshold: usize, reset: Duration) -> CircuitBreaker {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(threshold, reset));
        for _ in 0..threshold {
            cb.record_failure();
        }
        cb
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(cb.config().reset_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(3, Duration::from_secs(1)));

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(3, Duration::from_secs(1)));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 2);
    }

    #[test]
    fn test_circuit_rejects_when_open() {
        let cb = open_breaker(2, Duration::from_secs(10));
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.can_proceed().unwrap_err();
        assert_eq!(err.failures, 2);
        assert!(err.retry_in > Duration::ZERO);
        assert!(err.retry_in <= Duration::from_secs(10));
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let cb = open_breaker(2, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_proceed().is_err());
        assert!(cb.can_proceed().is_err());
    }

    #[test]
    fn test_trial_success_closes() {
        let cb = open_breaker(2, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed().is_ok());
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.can_proceed().is_ok());
    }

    #[test]
    fn test_trial_failure_reopens() {
        let cb = open_breaker(2, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.can_proceed().is_ok());
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.can_proceed().is_err());
    }

    #[test]
    fn test_zero_threshold_behaves_like_one() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(0, Duration::from_secs(1)));
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_call_success() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        let result = cb.call(|| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.ok(), Some(42));
    }

    #[tokio::test]
    async fn test_call_rejected_without_invoking() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(2, Duration::from_secs(5)));
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let _ = cb.call(|| async { Err::<i32, _>("error 1") }).await;
        let _ = cb.call(|| async { Err::<i32, _>("error 2") }).await;
        assert_eq!(cb.state(), CircuitState::Open);

        let result = cb
            .call(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(42)
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_with_ignores_uncounted_errors() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(1, Duration::from_secs(5)));

        let result = cb
            .call_with(|| async { Err::<(), u16>(404) }, |status| *status >= 500)
            .await;

        assert!(matches!(result, Err(BreakerError::Inner(404))));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_trial_frees_slot() {
        let cb = open_breaker(1, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let slow = cb.call(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_proceed().is_ok());
    }

    #[tokio::test]
    async fn test_late_success_does_not_close_open_circuit() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(1, Duration::from_secs(30)));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let slow_breaker = cb.clone();
        let slow = tokio::spawn(async move {
            slow_breaker
                .call(|| async move {
                    let _ = release_rx.await;
                    Ok::<_, &str>(())
                })
                .await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let failed = cb.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(failed, Err(BreakerError::Inner("boom"))));
        assert_eq!(cb.state(), CircuitState::Open);

        release_tx.send(()).unwrap();
        assert!(slow.await.unwrap().is_ok());

        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_late_failure_does_not_disturb_half_open_trial() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(2, Duration::from_millis(20)));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // Admitted while closed, finishes after the circuit went half-open
        let stale_breaker = cb.clone();
        let stale = tokio::spawn(async move {
            stale_breaker
                .call(|| async move {
                    let _ = release_rx.await;
                    Err::<(), _>("late")
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cb.can_proceed().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        release_tx.send(()).unwrap();
        let _ = stale.await.unwrap();

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_proceed().is_err(), "trial must still be in flight");

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[derive(Default)]
    struct Transitions(Mutex<Vec<(String, CircuitState, CircuitState)>>);

    impl CircuitObserver for Transitions {
        fn on_transition(&self, breaker: &str, from: CircuitState, to: CircuitState) {
            self.0.lock().unwrap().push((breaker.to_string(), from, to));
        }
    }

    #[test]
    fn test_observer_sees_every_transition() {
        let transitions = Arc::new(Transitions::default());
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new(1, Duration::from_millis(10)))
            .with_name("downstream")
            .with_observer(transitions.clone());

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.can_proceed().is_ok());
        cb.record_success();
        cb.record_success();

        let seen = transitions.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("downstream".to_string(), CircuitState::Closed, CircuitState::Open),
                ("downstream".to_string(), CircuitState::Open, CircuitState::HalfOpen),
                ("downstream".to_string(), CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn test_success_while_open_is_ignored() {
        let cb = open_breaker(1, Duration::from_secs(30));
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_circuit_breaker_reset() {
        let cb = open_breaker(2, Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
        assert_eq!(CircuitBreaker::new(CircuitBreakerConfig::default()).with_name("fwd").name(), "fwd");
    }
}
