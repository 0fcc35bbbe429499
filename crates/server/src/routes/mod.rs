//! HTTP routes

mod health;
mod ingest;

pub use ingest::{
    IDEMPOTENCY_HEADER, LEGACY_SIGNATURE_HEADER, SIGNATURE_HEADER, TENANT_HEADER,
    TIMESTAMP_HEADER,
};

use crate::middleware::track_http;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};

/// Builds the full router
///
/// HTTP metrics are attached with `route_layer`, so only matched routes are
/// counted and the route label is the pattern, never the raw path.
pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/:source/ingest", post(ingest::ingest))
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_http,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
