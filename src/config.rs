//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::relay::{RelayConfig as LiveRelayConfig, DEFAULT_SHUTDOWN_REASON};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Which event store implementation to run
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// SQLite database under `data_dir`
    Sqlite,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(ConfigError::Invalid(format!("unknown storage backend {:?}", other))),
        }
    }
}

/// Event store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("sensorlog").to_string_lossy().to_string())
        .unwrap_or_else(|| "./sensorlog_data".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Live relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_shutdown_reason")]
    pub shutdown_reason: String,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_max_connections() -> usize {
    1000
}

fn default_shutdown_reason() -> String {
    DEFAULT_SHUTDOWN_REASON.to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_connections: default_max_connections(),
            shutdown_reason: default_shutdown_reason(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("sensorlog").join("config.toml")),
            Some(PathBuf::from("/etc/sensorlog/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "relay.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.relay.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "relay.max_connections must be greater than zero".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Apply `SENSORLOG_*` environment variables
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = lookup("SENSORLOG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SENSORLOG_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Storage overrides
        if let Some(backend) = lookup("SENSORLOG_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.storage.backend = b,
                Err(e) => tracing::warn!("Ignoring SENSORLOG_STORAGE_BACKEND: {}", e),
            }
        }
        if let Some(data_dir) = lookup("SENSORLOG_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        // Relay overrides
        if let Some(interval) = lookup("SENSORLOG_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.relay.poll_interval_ms = ms;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("SENSORLOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SENSORLOG_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// HTTP settings in the form the API layer takes
    pub fn api_config(&self) -> crate::api::ApiConfig {
        crate::api::ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            request_timeout_ms: self.server.request_timeout_ms,
        }
    }

    /// Relay settings in the form the relay takes
    pub fn relay_config(&self) -> LiveRelayConfig {
        LiveRelayConfig {
            poll_interval: Duration::from_millis(self.relay.poll_interval_ms),
            max_connections: self.relay.max_connections,
            shutdown_reason: self.relay.shutdown_reason.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Sensorlog Configuration
#
# Environment variables override these settings:
# - SENSORLOG_HOST
# - SENSORLOG_PORT
# - SENSORLOG_STORAGE_BACKEND
# - SENSORLOG_DATA_DIR
# - SENSORLOG_POLL_INTERVAL_MS
# - SENSORLOG_LOG_LEVEL
# - SENSORLOG_LOG_FORMAT

[server]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 8080

# Deadline for a single request (ms)
request_timeout_ms = 30000

[storage]
# Event store backend: memory or sqlite
backend = "memory"

# Directory for the SQLite database (sqlite backend only)
data_dir = "~/.local/share/sensorlog"

[relay]
# How often live subscriptions poll for a new event (ms)
poll_interval_ms = 2000

# Maximum number of concurrent live subscriptions
max_connections = 1000

# Close reason sent to subscribers on shutdown
shutdown_reason = "server shutting down"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
