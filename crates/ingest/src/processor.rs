//! Business processing of accepted events

use async_trait::async_trait;
use hookgate_core::{TenantId, Timestamp};
use hookgate_network::{Client, NetworkError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// An authenticated, claimed event ready for processing
#[derive(Debug, Clone, Serialize)]
pub struct IngestEvent {
    pub tenant_id: TenantId,
    pub source: String,
    pub idempotency_key: String,
    pub received_at: Timestamp,
    pub payload: Value,
}

/// Failure of an [`EventProcessor`]
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A dependency is known to be down; nothing was attempted
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// A dependency failed
    #[error("downstream failure: {0}")]
    Downstream(String),

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

impl From<NetworkError> for ProcessError {
    fn from(err: NetworkError) -> Self {
        if err.is_circuit_open() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Downstream(err.to_string())
        }
    }
}

/// Performs the side effect of an accepted event
///
/// Called at most once per `(tenant, idempotency key)` while the claim is held.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process(&self, event: &IngestEvent) -> Result<(), ProcessError>;
}

/// Accepts every event without further work
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptingProcessor;

#[async_trait]
impl EventProcessor for AcceptingProcessor {
    async fn process(&self, event: &IngestEvent) -> Result<(), ProcessError> {
        log::info!(
            "accepted event tenant={} source={} key={}",
            event.tenant_id,
            event.source,
            event.idempotency_key
        );
        Ok(())
    }
}

/// Forwards events to a downstream URL through the resilient client
#[derive(Clone)]
pub struct ForwardingProcessor {
    client: Client,
    url: String,
}

impl ForwardingProcessor {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventProcessor for ForwardingProcessor {
    async fn process(&self, event: &IngestEvent) -> Result<(), ProcessError> {
        self.client
            .post_json(&self.url, event.tenant_id.as_str(), event)
            .await?;

        log::debug!(
            "forwarded event tenant={} source={} key={}",
            event.tenant_id,
            event.source,
            event.idempotency_key
        );
        Ok(())
    }
}
