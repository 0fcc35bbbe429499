//! hookgate configuration
//!
//! One TOML file with a section per concern. Sections implement
//! `ConfigSection` so they validate and merge independently.
//!
//! Precedence: defaults < `config.toml` < `HOOKGATE_*` environment variables.
//!
//! # Example
//!
//! ```rust,no_run
//! use hookgate_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Listening on {}", config.server.bind_address);
//! ```

mod env;
mod error;
mod manager;
mod persistence;
mod validation;

mod ingest_config;
mod reliability_config;
mod server_config;
mod storage_config;

pub use env::{apply_env_overrides, apply_overrides, ENV_PREFIX};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::{ConfigManager, CONFIG_FILE_NAME};
pub use validation::{ConfigSection, Validator, MIN_SECRET_LEN};

pub use ingest_config::{ClaimFailurePolicy, IngestConfig, SourceConfig};
pub use reliability_config::ReliabilityConfig;
pub use server_config::{LogLevel, ServerConfig};
pub use storage_config::StorageConfig;

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    pub server: ServerConfig,

    pub storage: StorageConfig,

    pub ingest: IngestConfig,

    pub reliability: ReliabilityConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.server.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.storage.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.ingest.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.reliability.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.server.merge(other.server);
        self.storage.merge(other.storage);
        self.ingest.merge(other.ingest);
        self.reliability.merge(other.reliability);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            ingest: IngestConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}
