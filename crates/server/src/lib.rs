//! hookgate HTTP server
//!
//! The axum surface over the ingest pipeline, plus metrics, health checks
//! and the periodic maintenance sweeper. The `hookgate` binary wraps this
//! crate in a CLI.

pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use metrics::Metrics;
pub use routes::router;
pub use state::{AppState, Services};
pub use sweeper::{SweepReport, Sweeper};
