//! Outbound call resilience configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry, circuit breaker and downstream settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReliabilityConfig {
    /// Total attempts per downstream call, including the first
    pub retry_attempts: u32,

    pub retry_base_delay_ms: u64,

    pub retry_max_delay_ms: u64,

    /// Consecutive failures that open the breaker
    pub breaker_threshold: u32,

    pub breaker_reset_timeout_ms: u64,

    /// Accepted events are forwarded here when set
    pub downstream_url: Option<String>,

    /// Per-attempt timeout for downstream requests
    pub downstream_timeout_ms: u64,
}

impl ReliabilityConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_reset_timeout_ms)
    }

    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_millis(self.downstream_timeout_ms)
    }
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 2_000,
            breaker_threshold: 5,
            breaker_reset_timeout_ms: 30_000,
            downstream_url: None,
            downstream_timeout_ms: 10_000,
        }
    }
}

impl ConfigSection for ReliabilityConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.retry_attempts, 1, 20, "reliability.retry_attempts"),
            Validator::at_least(self.retry_base_delay_ms, 1, "reliability.retry_base_delay_ms"),
            Validator::at_least(self.breaker_threshold, 1, "reliability.breaker_threshold"),
            Validator::at_least(
                self.breaker_reset_timeout_ms,
                1,
                "reliability.breaker_reset_timeout_ms",
            ),
            Validator::at_least(
                self.downstream_timeout_ms,
                1,
                "reliability.downstream_timeout_ms",
            ),
        ];

        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            results.push(Err(ValidationError::with_value(
                "reliability.retry_max_delay_ms",
                "must not be below retry_base_delay_ms",
                self.retry_max_delay_ms,
            )));
        }

        if let Some(url) = &self.downstream_url {
            results.push(Validator::http_url(url, "reliability.downstream_url"));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.retry_attempts = other.retry_attempts;
        self.retry_base_delay_ms = other.retry_base_delay_ms;
        self.retry_max_delay_ms = other.retry_max_delay_ms;
        self.breaker_threshold = other.breaker_threshold;
        self.breaker_reset_timeout_ms = other.breaker_reset_timeout_ms;
        if other.downstream_url.is_some() {
            self.downstream_url = other.downstream_url;
        }
        self.downstream_timeout_ms = other.downstream_timeout_ms;
    }

    fn section_name(&self) -> &'static str {
        "reliability"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ReliabilityConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.downstream_url.is_none());
    }

    #[test]
    fn test_max_delay_below_base() {
        let config = ReliabilityConfig {
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "reliability.retry_max_delay_ms");
    }

    #[test]
    fn test_downstream_url_scheme() {
        let config = ReliabilityConfig {
            downstream_url: Some("tcp://sink".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_keeps_url_when_other_has_none() {
        let mut base = ReliabilityConfig {
            downstream_url: Some("https://sink.example/events".to_string()),
            ..Default::default()
        };
        base.merge(ReliabilityConfig {
            retry_attempts: 7,
            ..Default::default()
        });
        assert_eq!(base.retry_attempts, 7);
        assert!(base.downstream_url.is_some());
    }
}
