//! Domain value types for hookgate
//!
//! - `common`: timestamps and tenant identifiers

mod common;

pub use common::{TenantId, Timestamp};
