//! Request lifecycle for inbound events
//!
//! admission -> signature -> body -> key -> claim -> process -> respond
//!
//! Nothing before the claim mutates shared state apart from the rate-limit
//! window, so a rejected request never consumes an idempotency slot.

use crate::dedup_cache::DedupCache;
use crate::error::IngestError;
use crate::gate::{ClaimOutcome, IdempotencyGate};
use crate::idempotency::derive_key;
use crate::observer::{IngestObserver, IngestOutcome, NoopIngestObserver, UNAUTHENTICATED_LABEL};
use crate::processor::{EventProcessor, IngestEvent, ProcessError};
use crate::signature::{SignatureError, SignatureVerifier};
use bytes::Bytes;
use hookgate_core::{AppError, TenantId, Timestamp};
use hookgate_resilience::RateLimiter;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happens to a claim when processing fails afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimFailurePolicy {
    /// Keep the record; a retry with the same key reads as a duplicate and the
    /// event must be reconciled out of band
    #[default]
    Retain,
    /// Delete the record so a retry with the same key is processed again
    Release,
}

impl ClaimFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::Release => "release",
        }
    }
}

impl FromStr for ClaimFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "release" => Ok(Self::Release),
            other => Err(format!("unknown claim failure policy '{}'", other)),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tenant assumed when a request names none
    pub default_tenant: String,
    pub claim_failure_policy: ClaimFailurePolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_tenant: TenantId::ANONYMOUS.to_string(),
            claim_failure_policy: ClaimFailurePolicy::Retain,
        }
    }
}

/// One inbound delivery, already lifted out of HTTP
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub source: String,
    pub tenant_id: Option<String>,
    /// Caller address used to scope the rate-limit window
    pub client_addr: Option<String>,
    pub idempotency_key: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub body: Bytes,
}

/// Rate-limit state reported on every response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub remaining: usize,
    pub window: Duration,
}

/// Successful outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// Claimed and processed
    Accepted { key: String },
    /// Already claimed; nothing was re-executed
    Duplicate { key: String },
}

impl IngestStatus {
    /// HTTP status for the response
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted { .. } => 201,
            Self::Duplicate { .. } => 204,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Accepted { key } | Self::Duplicate { key } => key,
        }
    }
}

/// Orchestrator reply: the outcome plus the caller's rate-limit state
#[derive(Debug)]
pub struct IngestResponse {
    pub tenant_id: TenantId,
    pub result: Result<IngestStatus, IngestError>,
    pub rate_limit: RateLimitInfo,
}

impl IngestResponse {
    pub fn status_code(&self) -> u16 {
        match &self.result {
            Ok(status) => status.status_code(),
            Err(err) => err.status_code(),
        }
    }
}

/// Composes admission, authentication, deduplication and processing
pub struct Orchestrator {
    rate_limiter: RateLimiter,
    verifier: SignatureVerifier,
    gate: IdempotencyGate,
    processor: Arc<dyn EventProcessor>,
    observer: Arc<dyn IngestObserver>,
    dedup_cache: Option<Arc<DedupCache>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        rate_limiter: RateLimiter,
        verifier: SignatureVerifier,
        gate: IdempotencyGate,
        processor: Arc<dyn EventProcessor>,
    ) -> Self {
        Self {
            rate_limiter,
            verifier,
            gate,
            processor,
            observer: Arc::new(NoopIngestObserver),
            dedup_cache: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Consults a node-local cache of settled keys before the store
    pub fn with_dedup_cache(mut self, cache: Arc<DedupCache>) -> Self {
        self.dedup_cache = Some(cache);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn gate(&self) -> &IdempotencyGate {
        &self.gate
    }

    pub fn dedup_cache(&self) -> Option<&DedupCache> {
        self.dedup_cache.as_deref()
    }

    /// Handles one delivery
    pub async fn handle(&self, request: IngestRequest) -> IngestResponse {
        let tenant =
            TenantId::resolve(request.tenant_id.as_deref(), &self.config.default_tenant);
        let started = Instant::now();

        let limit_key = match request.client_addr.as_deref() {
            Some(addr) => format!("{}:{}", tenant, addr),
            None => tenant.to_string(),
        };
        let allowed = self.rate_limiter.is_allowed(&limit_key);
        let rate_limit = RateLimitInfo {
            limit: self.rate_limiter.max_requests(),
            remaining: self.rate_limiter.remaining(&limit_key),
            window: self.rate_limiter.window(),
        };

        let result = if allowed {
            self.admitted(&tenant, &request, started).await
        } else {
            log::debug!(
                "rate limited tenant={} source={} key={}",
                tenant,
                request.source,
                limit_key
            );
            Err(IngestError::RateLimited {
                limit: rate_limit.limit,
                retry_after: rate_limit.window,
            })
        };

        let outcome = classify(&result);
        if outcome.is_unauthenticated() {
            self.observer
                .record_outcome(UNAUTHENTICATED_LABEL, UNAUTHENTICATED_LABEL, outcome);
        } else {
            self.observer
                .record_outcome(tenant.as_str(), &request.source, outcome);
        }

        IngestResponse {
            tenant_id: tenant,
            result,
            rate_limit,
        }
    }

    async fn admitted(
        &self,
        tenant: &TenantId,
        request: &IngestRequest,
        started: Instant,
    ) -> Result<IngestStatus, IngestError> {
        let source = request.source.as_str();

        self.verifier
            .verify(
                source,
                request.signature.as_deref(),
                request.timestamp.as_deref(),
                &request.body,
                Timestamp::now(),
            )
            .map_err(|err| {
                log::warn!(
                    "rejected signature tenant={} source={}: {}",
                    tenant,
                    source,
                    err
                );
                match err {
                    SignatureError::UnknownSource(name) => IngestError::UnknownSource { name },
                    SignatureError::Missing => IngestError::MissingSignature,
                    other => IngestError::InvalidSignature {
                        reason: other.to_string(),
                    },
                }
            })?;

        let result = self.authenticated(tenant, request).await;
        self.observer
            .observe_latency(tenant.as_str(), source, started.elapsed());
        result
    }

    async fn authenticated(
        &self,
        tenant: &TenantId,
        request: &IngestRequest,
    ) -> Result<IngestStatus, IngestError> {
        let source = request.source.as_str();
        let payload = parse_body(&request.body)?;

        let key = match request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            Some(key) => key.to_string(),
            None => derive_key(tenant.as_str(), source, &payload),
        };

        if let Some(cache) = &self.dedup_cache {
            if cache.contains(tenant.as_str(), &key) {
                log::debug!("cached duplicate tenant={} key={}", tenant, key);
                self.observer.record_duplicate(tenant.as_str(), source);
                return Ok(IngestStatus::Duplicate { key });
            }
        }

        let settlement = Settlement {
            gate: self.gate.clone(),
            processor: Arc::clone(&self.processor),
            observer: Arc::clone(&self.observer),
            dedup_cache: self.dedup_cache.clone(),
            policy: self.config.claim_failure_policy,
        };
        let event = IngestEvent {
            tenant_id: tenant.clone(),
            source: source.to_string(),
            idempotency_key: key,
            received_at: Timestamp::now(),
            payload,
        };

        // Detached so a dropped request future cannot strand a committed claim
        match tokio::spawn(settlement.run(event)).await {
            Ok(result) => result,
            Err(join_err) => {
                log::error!(
                    "settlement task aborted tenant={} source={}: {}",
                    tenant,
                    source,
                    join_err
                );
                Err(IngestError::ProcessingFailed {
                    reason: join_err.to_string(),
                })
            }
        }
    }
}

/// Claim and everything after it, owned so it can outlive the request
struct Settlement {
    gate: IdempotencyGate,
    processor: Arc<dyn EventProcessor>,
    observer: Arc<dyn IngestObserver>,
    dedup_cache: Option<Arc<DedupCache>>,
    policy: ClaimFailurePolicy,
}

impl Settlement {
    async fn run(self, event: IngestEvent) -> Result<IngestStatus, IngestError> {
        let tenant = event.tenant_id.as_str();

        match self.gate.claim(tenant, &event.idempotency_key).await? {
            ClaimOutcome::Duplicate => {
                remember(self.dedup_cache.as_deref(), tenant, &event.idempotency_key);
                self.observer.record_duplicate(tenant, &event.source);
                return Ok(IngestStatus::Duplicate {
                    key: event.idempotency_key,
                });
            }
            ClaimOutcome::Claimed => {}
        }

        match self.processor.process(&event).await {
            Ok(()) => {
                remember(self.dedup_cache.as_deref(), tenant, &event.idempotency_key);
                Ok(IngestStatus::Accepted {
                    key: event.idempotency_key,
                })
            }
            Err(err) => Err(self.claim_failed(&event, err).await),
        }
    }

    async fn claim_failed(&self, event: &IngestEvent, err: ProcessError) -> IngestError {
        let tenant = event.tenant_id.as_str();
        let key = &event.idempotency_key;

        match self.policy {
            ClaimFailurePolicy::Retain => {
                let failure = AppError::ClaimedButFailed {
                    key: key.clone(),
                    reason: err.to_string(),
                };
                log::error!(
                    "tenant={} source={}: {} ({})",
                    tenant,
                    event.source,
                    failure,
                    failure.recovery_action()
                );
            }
            ClaimFailurePolicy::Release => {
                log::error!(
                    "processing failed tenant={} source={} key={}: {}; releasing claim",
                    tenant,
                    event.source,
                    key,
                    err
                );
                if let Err(release_err) = self.gate.release(tenant, key).await {
                    log::error!(
                        "failed to release claim tenant={} key={}: {}",
                        tenant,
                        key,
                        release_err
                    );
                }
            }
        }

        match err {
            ProcessError::Unavailable(reason) => IngestError::DependencyUnavailable { reason },
            ProcessError::Downstream(reason) => IngestError::DownstreamFailed { reason },
            ProcessError::Failed(reason) => IngestError::ProcessingFailed { reason },
        }
    }
}

fn remember(cache: Option<&DedupCache>, tenant: &str, key: &str) {
    if let Some(cache) = cache {
        cache.insert(tenant, key);
    }
}

fn parse_body(body: &[u8]) -> Result<Value, IngestError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(IngestError::InvalidBody {
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(IngestError::InvalidBody {
            reason: e.to_string(),
        }),
    }
}

fn classify(result: &Result<IngestStatus, IngestError>) -> IngestOutcome {
    match result {
        Ok(IngestStatus::Accepted { .. }) => IngestOutcome::Accepted,
        Ok(IngestStatus::Duplicate { .. }) => IngestOutcome::Duplicate,
        Err(IngestError::RateLimited { .. }) => IngestOutcome::RateLimited,
        Err(
            IngestError::UnknownSource { .. }
            | IngestError::MissingSignature
            | IngestError::InvalidSignature { .. },
        ) => IngestOutcome::Unauthorized,
        Err(IngestError::InvalidBody { .. }) => IngestOutcome::Invalid,
        Err(_) => IngestOutcome::Failed,
    }
}
