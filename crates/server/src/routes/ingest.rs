//! `POST /{source}/ingest`

use crate::state::AppState;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use hookgate_ingest::{retry_after_secs, IngestRequest, IngestResponse, IngestStatus};
use serde_json::json;
use std::net::SocketAddr;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const LEGACY_SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static(IDEMPOTENCY_HEADER);

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn ingest(
    State(state): State<AppState>,
    Path(source): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = IngestRequest {
        source,
        tenant_id: header(&headers, TENANT_HEADER),
        client_addr: connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()),
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        signature: header(&headers, SIGNATURE_HEADER)
            .or_else(|| header(&headers, LEGACY_SIGNATURE_HEADER)),
        timestamp: header(&headers, TIMESTAMP_HEADER),
        body,
    };
    let source = request.source.clone();

    let response = state.orchestrator.handle(request).await;
    to_http(&source, response)
}

fn to_http(source: &str, response: IngestResponse) -> Response {
    let IngestResponse {
        tenant_id,
        result,
        rate_limit,
    } = response;

    let mut http = match result {
        Ok(status) => {
            let key = HeaderValue::from_str(status.key()).ok();
            let mut http = match status {
                IngestStatus::Accepted { .. } => {
                    (StatusCode::CREATED, Json(json!({ "status": "accepted" }))).into_response()
                }
                IngestStatus::Duplicate { .. } => StatusCode::NO_CONTENT.into_response(),
            };
            if let Some(key) = key {
                http.headers_mut().insert(IDEMPOTENCY_KEY, key);
            }
            http
        }
        Err(err) => {
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                log::error!(
                    "ingest failed tenant={} source={}: {}",
                    tenant_id,
                    source,
                    err
                );
            }

            let mut http = (
                status,
                Json(json!({
                    "error": err.error_code(),
                    "message": err.client_message(),
                })),
            )
                .into_response();
            if let Some(retry_after) = err.retry_after() {
                http.headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
            }
            http
        }
    };

    let headers = http.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(rate_limit.limit));
    headers.insert(
        RATE_LIMIT_REMAINING,
        HeaderValue::from(rate_limit.remaining),
    );
    http
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookgate_core::TenantId;
    use hookgate_ingest::{IngestError, RateLimitInfo};
    use std::time::Duration;

    fn limit() -> RateLimitInfo {
        RateLimitInfo {
            limit: 10,
            remaining: 0,
            window: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_header_prefers_trimmed_non_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("  "));
        headers.insert(LEGACY_SIGNATURE_HEADER, HeaderValue::from_static(" abc "));

        assert_eq!(header(&headers, SIGNATURE_HEADER), None);
        assert_eq!(
            header(&headers, LEGACY_SIGNATURE_HEADER),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_rate_limited_response_headers() {
        let response = to_http(
            "github",
            IngestResponse {
                tenant_id: TenantId::anonymous(),
                result: Err(IngestError::RateLimited {
                    limit: 10,
                    retry_after: Duration::from_millis(1500),
                }),
                rate_limit: limit(),
            },
        );

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "2");
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    }

    #[test]
    fn test_duplicate_has_no_body_but_echoes_key() {
        let response = to_http(
            "github",
            IngestResponse {
                tenant_id: TenantId::anonymous(),
                result: Ok(IngestStatus::Duplicate {
                    key: "evt-1".to_string(),
                }),
                rate_limit: limit(),
            },
        );

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[IDEMPOTENCY_HEADER], "evt-1");
        assert!(response.headers().get(RETRY_AFTER).is_none());
    }
}
