//! Prometheus metrics for hookgate
//!
//! All collectors live in one owned [`Registry`] so several servers (or tests)
//! can run in the same process without clashing.

use hookgate_ingest::{IngestObserver, IngestOutcome};
use hookgate_resilience::{CircuitObserver, CircuitState, RetryLabels, RetryObserver};
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const HTTP_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];
const INGEST_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

/// All hookgate metrics
pub struct Metrics {
    registry: Registry,

    /// Requests served (by method, route, status_code)
    pub http_requests: CounterVec,

    /// Request duration (by method, route, status_code)
    pub http_request_duration: HistogramVec,

    /// Time from authentication to response (by tenant_id, source)
    pub ingest_latency: HistogramVec,

    /// Final outcome of every ingest request (by tenant, source, outcome)
    pub ingest_requests: CounterVec,

    /// Duplicate deliveries (by tenant, source)
    pub ingest_dedup: CounterVec,

    /// Failed downstream attempts (by tenant, service)
    pub retry_attempts: CounterVec,

    /// Requests currently in flight
    pub active_connections: IntGauge,

    /// 1 while a breaker is open (by service)
    pub circuit_breaker_open: IntGaugeVec,

    /// 1 when the last store ping succeeded
    pub db_connection_status: IntGauge,
}

impl Metrics {
    /// Creates and registers every collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status_code"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(HTTP_BUCKETS.to_vec()),
            &["method", "route", "status_code"],
        )?;
        let ingest_latency = HistogramVec::new(
            HistogramOpts::new("ingest_latency_seconds", "Ingest processing latency")
                .buckets(INGEST_BUCKETS.to_vec()),
            &["tenant_id", "source"],
        )?;
        let ingest_requests = CounterVec::new(
            Opts::new("ingest_requests_total", "Ingest requests by outcome"),
            &["tenant", "source", "outcome"],
        )?;
        let ingest_dedup = CounterVec::new(
            Opts::new("ingest_dedup_total", "Duplicate ingest deliveries"),
            &["tenant", "source"],
        )?;
        let retry_attempts = CounterVec::new(
            Opts::new("retry_attempts_total", "Failed attempts of retried calls"),
            &["tenant", "service"],
        )?;
        let active_connections =
            IntGauge::new("active_connections", "Number of active connections")?;
        let circuit_breaker_open = IntGaugeVec::new(
            Opts::new("circuit_breaker_open", "Circuit breaker open (1) or not (0)"),
            &["service"],
        )?;
        let db_connection_status = IntGauge::new(
            "db_connection_status",
            "Database connection status (1 for connected, 0 for disconnected)",
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(ingest_latency.clone()))?;
        registry.register(Box::new(ingest_requests.clone()))?;
        registry.register(Box::new(ingest_dedup.clone()))?;
        registry.register(Box::new(retry_attempts.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(circuit_breaker_open.clone()))?;
        registry.register(Box::new(db_connection_status.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_request_duration,
            ingest_latency,
            ingest_requests,
            ingest_dedup,
            retry_attempts,
            active_connections,
            circuit_breaker_open,
            db_connection_status,
        })
    }

    /// Record one served HTTP request
    pub fn record_http(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        let labels = [method, route, status.as_str()];
        self.http_requests.with_label_values(&labels).inc();
        self.http_request_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_circuit_open(&self, service: &str, open: bool) {
        self.circuit_breaker_open
            .with_label_values(&[service])
            .set(i64::from(open));
    }

    pub fn set_db_connected(&self, connected: bool) {
        self.db_connection_status.set(i64::from(connected));
    }

    /// Encodes every metric in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl IngestObserver for Metrics {
    fn record_outcome(&self, tenant_id: &str, source: &str, outcome: IngestOutcome) {
        self.ingest_requests
            .with_label_values(&[tenant_id, source, outcome.as_str()])
            .inc();
    }

    fn record_duplicate(&self, tenant_id: &str, source: &str) {
        self.ingest_dedup
            .with_label_values(&[tenant_id, source])
            .inc();
    }

    fn observe_latency(&self, tenant_id: &str, source: &str, elapsed: Duration) {
        self.ingest_latency
            .with_label_values(&[tenant_id, source])
            .observe(elapsed.as_secs_f64());
    }
}

impl RetryObserver for Metrics {
    fn on_failed_attempt(&self, labels: &RetryLabels, attempt: usize, next_delay: Option<Duration>) {
        log::trace!(
            "retry attempt {} failed tenant={} service={} next_delay={:?}",
            attempt,
            labels.tenant,
            labels.service,
            next_delay
        );
        self.retry_attempts
            .with_label_values(&[labels.tenant.as_str(), labels.service.as_str()])
            .inc();
    }
}

impl CircuitObserver for Metrics {
    fn on_transition(&self, breaker: &str, from: CircuitState, to: CircuitState) {
        log::debug!(
            "circuit {} moved {} -> {}",
            breaker,
            from.as_str(),
            to.as_str()
        );
        self.set_circuit_open(breaker, to == CircuitState::Open);
    }
}
