//! Observer port for ingestion metrics
//!
//! The orchestrator reports through this trait instead of touching a metrics
//! backend, so it can be driven in tests without one.

use std::time::Duration;

/// Tenant and source label for requests rejected before authentication
///
/// Those values come straight from the caller, so they are never used as
/// metric labels.
pub const UNAUTHENTICATED_LABEL: &str = "unauthenticated";

/// Final classification of one inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestOutcome {
    Accepted,
    Duplicate,
    RateLimited,
    Unauthorized,
    Invalid,
    Failed,
}

impl IngestOutcome {
    /// Label value used by metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }

    /// Whether the request was rejected before its signature was accepted
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unauthorized)
    }
}

/// Receives ingestion events
pub trait IngestObserver: Send + Sync {
    /// Called once per request with its final outcome
    ///
    /// Both labels are [`UNAUTHENTICATED_LABEL`] when the outcome
    /// [`is_unauthenticated`](IngestOutcome::is_unauthenticated).
    fn record_outcome(&self, tenant_id: &str, source: &str, outcome: IngestOutcome);

    /// Called when a request is recognised as a duplicate
    fn record_duplicate(&self, tenant_id: &str, source: &str);

    /// Called for every authenticated request, whatever the outcome
    fn observe_latency(&self, tenant_id: &str, source: &str, elapsed: Duration);
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIngestObserver;

impl IngestObserver for NoopIngestObserver {
    fn record_outcome(&self, _: &str, _: &str, _: IngestOutcome) {}

    fn record_duplicate(&self, _: &str, _: &str) {}

    fn observe_latency(&self, _: &str, _: &str, _: Duration) {}
}
