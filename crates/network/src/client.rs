// crates/network/src/client.rs
//! HTTP client wrapper with resilience
//!
//! Calls are composed as circuit breaker around retrier around request: the
//! breaker sees one outcome per logical call, and a call rejected by an open
//! circuit never consumes retry budget.

use crate::error::{NetworkError, NetworkResult};
use bytes::Bytes;
use hookgate_resilience::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitObserver, Retrier, RetryError,
    RetryLabels, RetryObserver, RetryPolicy,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as ReqwestClient, Response};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Longest downstream error body kept for logging
const MAX_ERROR_BODY: usize = 512;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Name of the guarded dependency, used in logs and retry labels
    pub service_name: String,
    /// Retry policy
    pub retry_policy: RetryPolicy,
    /// Circuit breaker config
    pub circuit_breaker_config: CircuitBreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("hookgate/{}", env!("CARGO_PKG_VERSION")),
            service_name: "downstream".to_string(),
            retry_policy: RetryPolicy::new(3)
                .with_base_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(2)),
            circuit_breaker_config: CircuitBreakerConfig::new(5, Duration::from_secs(60)),
        }
    }
}

/// HTTP client guarded by a circuit breaker and a retrier
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
    retrier: Retrier,
    circuit_breaker: CircuitBreaker,
}

impl Client {
    /// Creates a new client with default configuration
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(NetworkError::Http)?;

        let circuit_breaker = CircuitBreaker::new(config.circuit_breaker_config.clone())
            .with_name(&config.service_name);
        let retrier = Retrier::new(config.retry_policy.clone());

        Ok(Self {
            inner: client,
            config,
            retrier,
            circuit_breaker,
        })
    }

    /// Reports every failed attempt to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.retrier = self.retrier.with_observer(observer);
        self
    }

    /// Reports every breaker transition to `observer`
    pub fn with_circuit_observer(mut self, observer: Arc<dyn CircuitObserver>) -> Self {
        self.circuit_breaker = self.circuit_breaker.with_observer(observer);
        self
    }

    /// Returns the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the breaker guarding this client's dependency
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// POSTs `body` serialized as JSON
    pub async fn post_json<T>(&self, url: &str, tenant: &str, body: &T) -> NetworkResult<Response>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| NetworkError::Custom(format!("Failed to encode body: {}", e)))?;
        self.post(url, tenant, Bytes::from(payload), "application/json")
            .await
    }

    /// POSTs raw bytes with the given content type
    ///
    /// The body is shared between attempts without copying.
    pub async fn post(
        &self,
        url: &str,
        tenant: &str,
        body: Bytes,
        content_type: &str,
    ) -> NetworkResult<Response> {
        let url = reqwest::Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
        self.request(tenant, || {
            self.inner
                .post(url.clone())
                .header(CONTENT_TYPE, content_type)
                .body(body.clone())
                .send()
        })
        .await
    }

    /// Performs a GET request
    pub async fn get(&self, url: &str, tenant: &str) -> NetworkResult<Response> {
        let url = reqwest::Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
        self.request(tenant, || self.inner.get(url.clone()).send())
            .await
    }

    /// Internal request handler with resilience
    async fn request<F, Fut>(&self, tenant: &str, request_fn: F) -> NetworkResult<Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let labels = RetryLabels::new(tenant, &self.config.service_name);
        let request_fn = &request_fn;

        let result = self
            .circuit_breaker
            .call_with(
                || {
                    self.retrier.execute_if(
                        &labels,
                        move || async move {
                            let response = request_fn().await.map_err(NetworkError::Http)?;
                            check_status(response).await
                        },
                        NetworkError::is_retryable,
                    )
                },
                |err: &RetryError<NetworkError>| err.last_error().is_retryable(),
            )
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(BreakerError::Open(open)) => {
                log::debug!(
                    "{} call rejected, circuit open (tenant={})",
                    self.config.service_name,
                    tenant
                );
                Err(NetworkError::CircuitOpen(open))
            }
            Err(BreakerError::Inner(RetryError::Exhausted {
                attempts,
                last_error,
            })) if attempts > 1 => Err(NetworkError::RetriesExhausted {
                attempts,
                last_error: Box::new(last_error),
            }),
            Err(BreakerError::Inner(err)) => Err(err.into_inner()),
        }
    }
}

/// Turns a non-success response into [`NetworkError::Status`]
async fn check_status(response: Response) -> NetworkResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    Err(NetworkError::Status {
        status: status.as_u16(),
        body,
    })
}
