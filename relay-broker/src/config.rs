//! Configuration loading for the broker.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Broker subsystem configuration.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Failure-handling limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Broker subsystem configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Enable the subscription/sync subsystem (default: true).
    ///
    /// When disabled, sync and publish events are ignored and only the
    /// generic room broadcasts remain active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Timeout in seconds for store range queries (default: 5).
    ///
    /// A hung store call fails the sync request instead of stalling the
    /// connection indefinitely.
    #[serde(default = "default_store_query_timeout_secs")]
    pub store_query_timeout_secs: u64,
    /// Maximum message body size in bytes (default: 64KB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Failure-handling limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Consecutive store failures before the circuit breaker opens
    /// (default: 5).
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    /// Seconds the breaker stays open before store calls are retried
    /// (default: 30).
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_store_query_timeout_secs() -> u64 {
    5
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_secs() -> u64 {
    30
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            store_query_timeout_secs: default_store_query_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
