//! Ingestion endpoint configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// What happens to an idempotency claim when processing fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClaimFailurePolicy {
    /// Keep the claim; retries read as duplicates
    #[default]
    Retain,
    /// Drop the claim so the sender may retry
    Release,
}

impl std::fmt::Display for ClaimFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimFailurePolicy::Retain => write!(f, "retain"),
            ClaimFailurePolicy::Release => write!(f, "release"),
        }
    }
}

/// A webhook sender and its signing secret
#[derive(Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SourceConfig {
    pub secret: String,
}

impl SourceConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Admission, signature and deduplication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Tenant used when `X-Tenant-Id` is absent
    pub default_tenant: String,

    /// Requests admitted per window and caller
    pub rate_limit_max: usize,

    pub rate_limit_window_ms: u64,

    /// Accepted clock skew for `X-Webhook-Timestamp`; 0 disables the check
    pub signature_tolerance_secs: u64,

    pub dedup_cache_enabled: bool,

    pub dedup_cache_ttl_secs: u64,

    pub claim_failure_policy: ClaimFailurePolicy,

    /// Known senders keyed by the `{source}` path segment
    pub sources: BTreeMap<String, SourceConfig>,
}

impl IngestConfig {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn signature_tolerance(&self) -> Duration {
        Duration::from_secs(self.signature_tolerance_secs)
    }

    pub fn dedup_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_cache_ttl_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_tenant: "anonymous".to_string(),
            rate_limit_max: 100,
            rate_limit_window_ms: 15 * 60 * 1000,
            signature_tolerance_secs: 300,
            dedup_cache_enabled: true,
            dedup_cache_ttl_secs: 300,
            claim_failure_policy: ClaimFailurePolicy::Retain,
            sources: BTreeMap::new(),
        }
    }
}

fn valid_source_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

impl ConfigSection for IngestConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::not_empty(&self.default_tenant, "ingest.default_tenant"),
            Validator::at_least(self.rate_limit_max, 1, "ingest.rate_limit_max"),
            Validator::at_least(self.rate_limit_window_ms, 1, "ingest.rate_limit_window_ms"),
        ];

        if self.dedup_cache_enabled {
            results.push(Validator::at_least(
                self.dedup_cache_ttl_secs,
                1,
                "ingest.dedup_cache_ttl_secs",
            ));
        }

        for (name, source) in &self.sources {
            if !valid_source_name(name) {
                results.push(Err(ValidationError::with_value(
                    "ingest.sources",
                    "source names use lowercase letters, digits, '-' or '_'",
                    name,
                )));
            }
            results.push(Validator::secret(
                &source.secret,
                &format!("ingest.sources.{}.secret", name),
            ));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.default_tenant = other.default_tenant;
        self.rate_limit_max = other.rate_limit_max;
        self.rate_limit_window_ms = other.rate_limit_window_ms;
        self.signature_tolerance_secs = other.signature_tolerance_secs;
        self.dedup_cache_enabled = other.dedup_cache_enabled;
        self.dedup_cache_ttl_secs = other.dedup_cache_ttl_secs;
        self.claim_failure_policy = other.claim_failure_policy;
        self.sources.extend(other.sources);
    }

    fn section_name(&self) -> &'static str {
        "ingest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_default_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit_window(), Duration::from_secs(900));
        assert_eq!(config.claim_failure_policy, ClaimFailurePolicy::Retain);
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = IngestConfig::default();
        config
            .sources
            .insert("github".to_string(), SourceConfig::new("too-short"));

        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "ingest.sources.github.secret");
    }

    #[test]
    fn test_bad_source_name_rejected() {
        let mut config = IngestConfig::default();
        config
            .sources
            .insert("Git Hub".to_string(), SourceConfig::new(SECRET));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_extends_sources() {
        let mut base = IngestConfig::default();
        base.sources
            .insert("github".to_string(), SourceConfig::new(SECRET));

        let mut other = IngestConfig::default();
        other
            .sources
            .insert("stripe".to_string(), SourceConfig::new(SECRET));
        other.claim_failure_policy = ClaimFailurePolicy::Release;

        base.merge(other);
        assert_eq!(base.sources.len(), 2);
        assert_eq!(base.claim_failure_policy, ClaimFailurePolicy::Release);
    }

    #[test]
    fn test_source_debug_redacts_secret() {
        let debug = format!("{:?}", SourceConfig::new(SECRET));
        assert!(!debug.contains(SECRET));
    }

    #[test]
    fn test_policy_from_toml() {
        let config: IngestConfig = toml::from_str("claim_failure_policy = \"release\"").unwrap();
        assert_eq!(config.claim_failure_policy, ClaimFailurePolicy::Release);
        assert_eq!(config.rate_limit_max, 100);
    }
}
