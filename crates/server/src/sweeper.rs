//! Periodic maintenance
//!
//! Purges idempotency records past retention, drops idle rate-limit keys,
//! expires dedup cache entries and refreshes the breaker and store gauges.

use crate::metrics::Metrics;
use hookgate_core::Timestamp;
use hookgate_database::{ping, queries, DbPool};
use hookgate_ingest::DedupCache;
use hookgate_resilience::{CircuitBreaker, CircuitState, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What one sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub purged_records: u64,
    pub dropped_limiter_keys: usize,
}

pub struct Sweeper {
    pub pool: DbPool,
    pub rate_limiter: RateLimiter,
    pub dedup_cache: Option<Arc<DedupCache>>,
    pub breaker: Option<CircuitBreaker>,
    pub metrics: Arc<Metrics>,
    pub retention: Duration,
}

impl Sweeper {
    /// Runs one maintenance pass; failures are logged, never fatal
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let cutoff = Timestamp::now().saturating_sub(self.retention);
        match queries::purge_expired(&self.pool, cutoff).await {
            Ok(purged) => {
                report.purged_records = purged;
                if purged > 0 {
                    log::info!("Purged {} idempotency records older than {}", purged, cutoff);
                }
            }
            Err(e) => log::error!("Retention sweep failed: {}", e),
        }

        report.dropped_limiter_keys = self.rate_limiter.sweep();

        if let Some(cache) = &self.dedup_cache {
            cache.cleanup();
        }

        if let Some(breaker) = &self.breaker {
            self.metrics
                .set_circuit_open(breaker.name(), breaker.state() == CircuitState::Open);
        }

        let connected = ping(&self.pool).await.is_ok();
        self.metrics.set_db_connected(connected);

        log::debug!(
            "Sweep done: purged={} limiter_keys_dropped={} db_connected={}",
            report.purged_records,
            report.dropped_limiter_keys,
            connected
        );
        report
    }

    /// Runs [`Sweeper::run_once`] every `interval` until the task is aborted
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
