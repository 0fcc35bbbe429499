//! Environment variable overrides
//!
//! Variables follow `HOOKGATE_<SECTION>_<FIELD>`, e.g.
//! `HOOKGATE_INGEST_RATE_LIMIT_MAX=50`. Source secrets use
//! `HOOKGATE_SOURCE_<NAME>_SECRET`; the name is lowercased.

use crate::ingest_config::{ClaimFailurePolicy, SourceConfig};
use crate::{Config, ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix shared by every override
pub const ENV_PREFIX: &str = "HOOKGATE_";

/// Applies overrides from the process environment
pub fn apply_env_overrides(config: &mut Config) -> ConfigResult<usize> {
    apply_overrides(config, std::env::vars())
}

/// Applies overrides from `vars`, returning how many were used
///
/// Unrecognised `HOOKGATE_` variables are logged and skipped. A recognised
/// variable with an unparsable value is an error.
pub fn apply_overrides<I, K, V>(config: &mut Config, vars: I) -> ConfigResult<usize>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut applied = 0;

    for (name, value) in vars {
        let name = name.as_ref();
        let Some(field) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        if apply_one(config, name, field, value.as_ref().trim())? {
            log::info!("Config override from {}", name);
            applied += 1;
        } else {
            log::warn!("Ignoring unknown config variable {}", name);
        }
    }

    Ok(applied)
}

fn apply_one(config: &mut Config, var: &str, field: &str, value: &str) -> ConfigResult<bool> {
    if let Some(source) = field
        .strip_prefix("SOURCE_")
        .and_then(|rest| rest.strip_suffix("_SECRET"))
        .filter(|name| !name.is_empty())
    {
        config
            .ingest
            .sources
            .insert(source.to_ascii_lowercase(), SourceConfig::new(value));
        return Ok(true);
    }

    let server = &mut config.server;
    let storage = &mut config.storage;
    let ingest = &mut config.ingest;
    let reliability = &mut config.reliability;

    match field {
        "SERVER_BIND_ADDRESS" => server.bind_address = value.to_string(),
        "SERVER_LOG_LEVEL" => server.log_level = parse(var, value)?,
        "SERVER_READINESS_TIMEOUT_MS" => server.readiness_timeout_ms = parse(var, value)?,
        "SERVER_BODY_LIMIT_BYTES" => server.body_limit_bytes = parse(var, value)?,

        "STORAGE_DATABASE_PATH" => storage.database_path = PathBuf::from(value),
        "STORAGE_MAX_CONNECTIONS" => storage.max_connections = parse(var, value)?,
        "STORAGE_ENABLE_WAL" => storage.enable_wal = parse_bool(var, value)?,
        "STORAGE_RETENTION_HOURS" => storage.retention_hours = parse(var, value)?,
        "STORAGE_SWEEP_INTERVAL_SECS" => storage.sweep_interval_secs = parse(var, value)?,

        "INGEST_DEFAULT_TENANT" => ingest.default_tenant = value.to_string(),
        "INGEST_RATE_LIMIT_MAX" => ingest.rate_limit_max = parse(var, value)?,
        "INGEST_RATE_LIMIT_WINDOW_MS" => ingest.rate_limit_window_ms = parse(var, value)?,
        "INGEST_SIGNATURE_TOLERANCE_SECS" => {
            ingest.signature_tolerance_secs = parse(var, value)?
        }
        "INGEST_DEDUP_CACHE_ENABLED" => ingest.dedup_cache_enabled = parse_bool(var, value)?,
        "INGEST_DEDUP_CACHE_TTL_SECS" => ingest.dedup_cache_ttl_secs = parse(var, value)?,
        "INGEST_CLAIM_FAILURE_POLICY" => {
            ingest.claim_failure_policy = parse_policy(var, value)?
        }

        "RELIABILITY_RETRY_ATTEMPTS" => reliability.retry_attempts = parse(var, value)?,
        "RELIABILITY_RETRY_BASE_DELAY_MS" => {
            reliability.retry_base_delay_ms = parse(var, value)?
        }
        "RELIABILITY_RETRY_MAX_DELAY_MS" => reliability.retry_max_delay_ms = parse(var, value)?,
        "RELIABILITY_BREAKER_THRESHOLD" => reliability.breaker_threshold = parse(var, value)?,
        "RELIABILITY_BREAKER_RESET_TIMEOUT_MS" => {
            reliability.breaker_reset_timeout_ms = parse(var, value)?
        }
        "RELIABILITY_DOWNSTREAM_URL" => {
            reliability.downstream_url = Some(value.to_string()).filter(|url| !url.is_empty())
        }
        "RELIABILITY_DOWNSTREAM_TIMEOUT_MS" => {
            reliability.downstream_timeout_ms = parse(var, value)?
        }

        _ => return Ok(false),
    }

    Ok(true)
}

fn parse<T>(var: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::EnvOverride {
        variable: var.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvOverride {
            variable: var.to_string(),
            reason: format!("expected a boolean, got '{}'", value),
        }),
    }
}

fn parse_policy(var: &str, value: &str) -> ConfigResult<ClaimFailurePolicy> {
    match value.to_ascii_lowercase().as_str() {
        "retain" => Ok(ClaimFailurePolicy::Retain),
        "release" => Ok(ClaimFailurePolicy::Release),
        _ => Err(ConfigError::EnvOverride {
            variable: var.to_string(),
            reason: format!("expected 'retain' or 'release', got '{}'", value),
        }),
    }
}
