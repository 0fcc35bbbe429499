//! Node-local cache of completed idempotency keys
//!
//! Lets repeated deliveries of a recently handled event short-circuit before
//! touching the store. It only ever remembers keys the store has already
//! settled, and it is not shared between nodes, so the store's uniqueness
//! constraint remains the only guarantee.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// TTL-bounded set of `(tenant, key)` pairs
#[derive(Debug)]
pub struct DedupCache {
    /// `tenant \0 key` -> time the key was settled
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
    ops_since_cleanup: AtomicU32,
    /// Cleanup every N operations (minimum 1)
    cleanup_interval: u32,
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_cleanup_interval(ttl, 1000)
    }

    pub fn with_cleanup_interval(ttl: Duration, cleanup_interval: u32) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
            ops_since_cleanup: AtomicU32::new(0),
            cleanup_interval: cleanup_interval.max(1),
        }
    }

    fn entry_key(tenant_id: &str, key: &str) -> String {
        let mut entry = String::with_capacity(tenant_id.len() + key.len() + 1);
        entry.push_str(tenant_id);
        entry.push('\0');
        entry.push_str(key);
        entry
    }

    /// Returns true if `(tenant_id, key)` was settled within the TTL
    pub fn contains(&self, tenant_id: &str, key: &str) -> bool {
        let now = Instant::now();
        self.maybe_cleanup(now);

        let seen = self.seen.lock();
        seen.get(&Self::entry_key(tenant_id, key))
            .map(|settled| now.duration_since(*settled) < self.ttl)
            .unwrap_or(false)
    }

    /// Remembers `(tenant_id, key)` as settled
    pub fn insert(&self, tenant_id: &str, key: &str) {
        let now = Instant::now();
        self.seen.lock().insert(Self::entry_key(tenant_id, key), now);
    }

    fn maybe_cleanup(&self, now: Instant) {
        let ops = self.ops_since_cleanup.fetch_add(1, Ordering::Relaxed);
        if ops >= self.cleanup_interval {
            self.ops_since_cleanup.store(0, Ordering::Relaxed);
            self.cleanup_at(now);
        }
    }

    /// Removes expired entries
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.seen
            .lock()
            .retain(|_, settled| now.duration_since(*settled) < self.ttl);
    }

    /// Current number of remembered keys
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remembers_inserted_keys() {
        let cache = DedupCache::new(Duration::from_secs(60));
        assert!(!cache.contains("t", "k"));

        cache.insert("t", "k");
        assert!(cache.contains("t", "k"));
        assert!(!cache.contains("other", "k"));
    }

    #[test]
    fn test_tenant_and_key_cannot_alias() {
        let cache = DedupCache::new(Duration::from_secs(60));
        cache.insert("ab", "c");
        assert!(!cache.contains("a", "bc"));
    }

    #[test]
    fn test_entries_expire() {
        let cache = DedupCache::new(Duration::from_millis(20));
        cache.insert("t", "k");
        std::thread::sleep(Duration::from_millis(30));

        assert!(!cache.contains("t", "k"));
        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_periodic_cleanup() {
        let cache = DedupCache::with_cleanup_interval(Duration::from_millis(10), 2);
        cache.insert("t", "a");
        cache.insert("t", "b");
        std::thread::sleep(Duration::from_millis(20));

        for _ in 0..3 {
            cache.contains("t", "x");
        }
        assert_eq!(cache.len(), 0);
    }
}
