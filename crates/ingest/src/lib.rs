//! Webhook ingestion pipeline
//!
//! An inbound event passes rate-limit admission and signature verification,
//! then claims its `(tenant, idempotency key)` in the store before any side
//! effect runs. Duplicates are acknowledged without re-executing.
//!
//! # Example
//!
//! ```rust,no_run
//! use hookgate_database::{connect_in_memory, run_migrations, SqliteIdempotencyStore};
//! use hookgate_ingest::{
//!     AcceptingProcessor, IdempotencyGate, IngestRequest, Orchestrator, SignatureVerifier,
//! };
//! use hookgate_resilience::RateLimiter;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect_in_memory().await?;
//! run_migrations(&pool).await?;
//!
//! let orchestrator = Orchestrator::new(
//!     RateLimiter::new(100, Duration::from_secs(60)),
//!     SignatureVerifier::new().with_source("github", "0123456789abcdef0123456789abcdef"),
//!     IdempotencyGate::new(Arc::new(SqliteIdempotencyStore::new(pool))),
//!     Arc::new(AcceptingProcessor),
//! );
//!
//! let response = orchestrator
//!     .handle(IngestRequest {
//!         source: "github".to_string(),
//!         ..Default::default()
//!     })
//!     .await;
//! println!("{}", response.status_code());
//! # Ok(())
//! # }
//! ```

pub mod dedup_cache;
pub mod error;
pub mod gate;
pub mod idempotency;
pub mod observer;
pub mod orchestrator;
pub mod processor;
pub mod signature;

pub use dedup_cache::DedupCache;
pub use error::{retry_after_secs, IngestError, IngestResult};
pub use gate::{ClaimOutcome, IdempotencyGate};
pub use idempotency::{canonical_json, derive_key, generate_key, DERIVED_KEY_PREFIX};
pub use observer::{IngestObserver, IngestOutcome, NoopIngestObserver, UNAUTHENTICATED_LABEL};
pub use orchestrator::{
    ClaimFailurePolicy, IngestRequest, IngestResponse, IngestStatus, Orchestrator,
    OrchestratorConfig, RateLimitInfo,
};
pub use processor::{
    AcceptingProcessor, EventProcessor, ForwardingProcessor, IngestEvent, ProcessError,
};
pub use signature::{sign, SignatureError, SignatureVerifier};
