//! Idempotency store configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// SQLite store and retention settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path (relative to the working directory if not absolute)
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// Write-ahead logging
    pub enable_wal: bool,

    /// Idempotency records older than this are purged
    pub retention_hours: u64,

    /// Period of the background retention sweep
    pub sweep_interval_secs: u64,
}

impl StorageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("hookgate.db"),
            max_connections: 10,
            enable_wal: true,
            retention_hours: 168,
            sweep_interval_secs: 3600,
        }
    }
}

impl ConfigSection for StorageConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if self.database_path.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "storage.database_path",
                "must not be empty",
            )));
        }

        results.push(Validator::in_range(
            self.max_connections,
            1,
            128,
            "storage.max_connections",
        ));
        results.push(Validator::at_least(
            self.retention_hours,
            1,
            "storage.retention_hours",
        ));
        results.push(Validator::at_least(
            self.sweep_interval_secs,
            1,
            "storage.sweep_interval_secs",
        ));

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.database_path = other.database_path;
        self.max_connections = other.max_connections;
        self.enable_wal = other.enable_wal;
        self.retention_hours = other.retention_hours;
        self.sweep_interval_secs = other.sweep_interval_secs;
    }

    fn section_name(&self) -> &'static str {
        "storage"
    }
}
