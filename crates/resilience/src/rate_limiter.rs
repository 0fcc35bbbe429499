// crates/resilience/src/rate_limiter.rs
//! Keyed fixed-window rate limiting
//!
//! Each key keeps the timestamps of its admitted requests inside the current
//! window. A request is admitted while fewer than `max_requests` timestamps
//! are younger than `window`.

use crate::error::{ResilienceError, ResilienceResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Per-key fixed-window request counter
///
/// Timestamps older than `window` are pruned on every check.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl RateLimiter {
    /// Creates a new rate limiter
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops timestamps that have left the window
    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = entries.front() {
            if now.saturating_duration_since(oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Checks and, when admitted, records a request for `key`
    pub fn is_allowed(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.lock();
        let entries = requests.entry(key.to_string()).or_default();

        Self::prune(entries, now, self.window);

        if entries.len() < self.max_requests {
            entries.push_back(now);
            true
        } else {
            false
        }
    }

    /// Remaining admissions for `key` in the current window
    ///
    /// Does not record a request.
    pub fn remaining(&self, key: &str) -> usize {
        let now = Instant::now();
        let requests = self.lock();
        let used = requests
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|&&t| now.saturating_duration_since(t) < self.window)
                    .count()
            })
            .unwrap_or(0);

        self.max_requests.saturating_sub(used)
    }

    /// Like [`is_allowed`](Self::is_allowed), returning an error when rejected
    pub fn try_acquire(&self, key: &str) -> ResilienceResult<()> {
        if self.is_allowed(key) {
            Ok(())
        } else {
            Err(ResilienceError::RateLimitExceeded {
                limit: self.max_requests,
                window: self.window,
            })
        }
    }

    /// Removes keys whose every timestamp has left the window
    ///
    /// Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut requests = self.lock();
        let before = requests.len();

        requests.retain(|_, entries| {
            Self::prune(entries, now, self.window);
            !entries.is_empty()
        });

        before - requests.len()
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Gets the maximum number of requests allowed
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Gets the time window
    pub fn window(&self) -> Duration {
        self.window
    }
}
