//! HTTP server configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Log level for application logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_address: String,

    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: LogLevel,

    /// Upper bound on the store ping behind `/health/ready`
    pub readiness_timeout_ms: u64,

    /// Largest accepted request body
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            log_level: LogLevel::Info,
            readiness_timeout_ms: 5_000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl ConfigSection for ServerConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::socket_addr(&self.bind_address, "server.bind_address"),
            Validator::in_range(
                self.readiness_timeout_ms,
                100,
                60_000,
                "server.readiness_timeout_ms",
            ),
            Validator::at_least(self.body_limit_bytes, 1024, "server.body_limit_bytes"),
        ])
    }

    fn merge(&mut self, other: Self) {
        self.bind_address = other.bind_address;
        self.log_level = other.log_level;
        self.readiness_timeout_ms = other.readiness_timeout_ms;
        self.body_limit_bytes = other.body_limit_bytes;
    }

    fn section_name(&self) -> &'static str {
        "server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ServerConfig {
            bind_address: "nowhere".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "server.bind_address");
    }

    #[test]
    fn test_readiness_timeout_bounds() {
        let config = ServerConfig {
            readiness_timeout_ms: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(
            ServerConfig::default().readiness_timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_log_level_parse_and_display() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
