//! Wiring from configuration to running services
//!
//! The dependency graph is built once here and handed to the router and the
//! sweeper. Nothing in the pipeline reaches for global state.

use crate::metrics::Metrics;
use crate::sweeper::Sweeper;
use anyhow::{Context, Result};
use hookgate_config::{ClaimFailurePolicy as ConfiguredPolicy, Config};
use hookgate_database::{DbPool, SqliteIdempotencyStore};
use hookgate_ingest::{
    AcceptingProcessor, ClaimFailurePolicy, DedupCache, EventProcessor, ForwardingProcessor,
    IdempotencyGate, Orchestrator, OrchestratorConfig, SignatureVerifier,
};
use hookgate_network::{Client, ClientConfig};
use hookgate_resilience::{CircuitBreaker, CircuitBreakerConfig, RateLimiter, RetryPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state behind every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<Metrics>,
    pub readiness_timeout: Duration,
    pub started: Instant,
}

/// Everything `serve` runs
pub struct Services {
    pub state: AppState,
    pub sweeper: Sweeper,
}

impl Services {
    /// Builds the ingest pipeline and its maintenance task from `config`
    pub fn build(config: &Config, pool: DbPool, metrics: Arc<Metrics>) -> Result<Self> {
        let mut verifier =
            SignatureVerifier::new().with_tolerance(config.ingest.signature_tolerance());
        for (name, source) in &config.ingest.sources {
            verifier = verifier.with_source(name, &source.secret);
        }
        if config.ingest.sources.is_empty() {
            log::warn!("No ingest sources configured; every delivery will be rejected");
        }

        let rate_limiter = RateLimiter::new(
            config.ingest.rate_limit_max,
            config.ingest.rate_limit_window(),
        );
        let gate = IdempotencyGate::new(Arc::new(SqliteIdempotencyStore::new(pool.clone())));

        let (processor, breaker) = build_processor(config, &metrics)?;

        let mut orchestrator = Orchestrator::new(rate_limiter.clone(), verifier, gate, processor)
            .with_observer(metrics.clone())
            .with_config(OrchestratorConfig {
                default_tenant: config.ingest.default_tenant.clone(),
                claim_failure_policy: match config.ingest.claim_failure_policy {
                    ConfiguredPolicy::Retain => ClaimFailurePolicy::Retain,
                    ConfiguredPolicy::Release => ClaimFailurePolicy::Release,
                },
            });

        let dedup_cache = config
            .ingest
            .dedup_cache_enabled
            .then(|| Arc::new(DedupCache::new(config.ingest.dedup_cache_ttl())));
        if let Some(cache) = &dedup_cache {
            orchestrator = orchestrator.with_dedup_cache(cache.clone());
        }

        let sweeper = Sweeper {
            pool,
            rate_limiter,
            dedup_cache,
            breaker,
            metrics: metrics.clone(),
            retention: config.storage.retention(),
        };

        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            metrics,
            readiness_timeout: config.server.readiness_timeout(),
            started: Instant::now(),
        };

        Ok(Self { state, sweeper })
    }
}

fn build_processor(
    config: &Config,
    metrics: &Arc<Metrics>,
) -> Result<(Arc<dyn EventProcessor>, Option<CircuitBreaker>)> {
    let reliability = &config.reliability;
    let Some(url) = &reliability.downstream_url else {
        log::info!("No downstream configured; accepted events are only recorded");
        return Ok((Arc::new(AcceptingProcessor), None));
    };

    let client_config = ClientConfig {
        timeout: reliability.downstream_timeout(),
        retry_policy: RetryPolicy::new(reliability.retry_attempts as usize)
            .with_base_delay(reliability.retry_base_delay())
            .with_max_delay(reliability.retry_max_delay()),
        circuit_breaker_config: CircuitBreakerConfig::new(
            reliability.breaker_threshold as usize,
            reliability.breaker_reset_timeout(),
        ),
        ..ClientConfig::default()
    };
    let client = Client::with_config(client_config)
        .context("Failed to build downstream client")?
        .with_observer(metrics.clone())
        .with_circuit_observer(metrics.clone());
    let breaker = client.circuit_breaker().clone();
    metrics.set_circuit_open(breaker.name(), false);

    log::info!("Forwarding accepted events to {}", url);
    Ok((Arc::new(ForwardingProcessor::new(client, url.clone())), Some(breaker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookgate_config::SourceConfig;
    use hookgate_database::{connect_in_memory, run_migrations};

    async fn pool() -> DbPool {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_build_without_downstream() {
        let mut config = Config::default();
        config.ingest.sources.insert(
            "github".to_string(),
            SourceConfig::new("0123456789abcdef0123456789abcdef"),
        );

        let services =
            Services::build(&config, pool().await, Arc::new(Metrics::new().unwrap())).unwrap();
        assert!(services.sweeper.breaker.is_none());
        assert!(services.sweeper.dedup_cache.is_some());
        assert_eq!(services.state.readiness_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_build_with_downstream_exposes_breaker() {
        let mut config = Config::default();
        config.ingest.dedup_cache_enabled = false;
        config.reliability.downstream_url = Some("http://127.0.0.1:9/events".to_string());

        let services =
            Services::build(&config, pool().await, Arc::new(Metrics::new().unwrap())).unwrap();
        let breaker = services.sweeper.breaker.as_ref().unwrap();
        assert_eq!(breaker.config().failure_threshold(), 5);
        assert!(services.sweeper.dedup_cache.is_none());
    }

    #[tokio::test]
    async fn test_breaker_trip_updates_gauge_immediately() {
        let mut config = Config::default();
        config.reliability.downstream_url = Some("http://127.0.0.1:9/events".to_string());
        config.reliability.breaker_threshold = 1;

        let metrics = Arc::new(Metrics::new().unwrap());
        let services = Services::build(&config, pool().await, metrics.clone()).unwrap();
        let breaker = services.sweeper.breaker.as_ref().unwrap();
        let gauge = || {
            metrics
                .circuit_breaker_open
                .with_label_values(&[breaker.name()])
                .get()
        };
        assert_eq!(gauge(), 0);

        breaker.record_failure();
        assert_eq!(gauge(), 1);

        breaker.reset();
        assert_eq!(gauge(), 0);
    }
}
