// crates/resilience/src/backoff.rs
//! Decorrelated-jitter backoff
//!
//! Each delay is drawn uniformly from `[base, min(max, previous * 3)]`, so
//! concurrent callers that failed together spread their retries apart instead
//! of hammering the dependency in lockstep.

use rand::Rng;
use std::time::Duration;

/// Computes the next retry delay
///
/// Pure given its random source: the same `rng` state always yields the same
/// delay. The result is floored at `base_delay` and, whenever
/// `base_delay <= max_delay`, never exceeds `max_delay`.
pub fn next_delay<R: Rng + ?Sized>(
    base_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    rng: &mut R,
) -> Duration {
    let base = as_nanos(base_delay);
    let max = as_nanos(max_delay).max(base);
    let upper = as_nanos(current_delay).saturating_mul(3).min(max).max(base);

    if upper == base {
        return Duration::from_nanos(base);
    }

    Duration::from_nanos(rng.gen_range(base..=upper))
}

fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Backoff bounds bundled for repeated use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorrelatedJitter {
    base_delay: Duration,
    max_delay: Duration,
}

impl DecorrelatedJitter {
    /// Creates a calculator with the given bounds
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Lower bound of every delay
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound of every delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to use after a failure that followed `current_delay`
    pub fn next<R: Rng + ?Sized>(&self, current_delay: Duration, rng: &mut R) -> Duration {
        next_delay(self.base_delay, current_delay, self.max_delay, rng)
    }
}
