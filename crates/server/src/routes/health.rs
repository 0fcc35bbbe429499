//! Health, readiness and metrics endpoints

use crate::metrics::CONTENT_TYPE;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hookgate_resilience::with_timeout;
use serde_json::json;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

pub async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

/// Pings the store, bounded by the configured readiness timeout
pub async fn ready(State(state): State<AppState>) -> Response {
    let outcome = with_timeout(state.readiness_timeout, state.orchestrator.gate().ping()).await;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(e.to_string()),
    };

    match failure {
        None => {
            state.metrics.set_db_connected(true);
            (
                StatusCode::OK,
                Json(json!({ "status": "ready", "database": "connected" })),
            )
                .into_response()
        }
        Some(reason) => {
            state.metrics.set_db_connected(false);
            log::warn!("Readiness check failed: {}", reason);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not ready", "database": "disconnected" })),
            )
                .into_response()
        }
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
