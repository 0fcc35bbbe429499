//! Database query operations organized by entity

pub mod idempotency;

pub use idempotency::{
    count_records, count_tenant_records, delete_record, get_record, insert_record, purge_expired,
    IdempotencyRecord, InsertOutcome,
};
