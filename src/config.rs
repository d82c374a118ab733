//! Configuration for cash

use crate::persistence::SyncPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Read buffer size per connection (bytes)
    pub read_buffer_size: usize,

    /// Longest accepted message without a newline (bytes)
    pub max_message_size: usize,

    /// Number of Tokio worker threads (0 = number of CPUs)
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6400".to_string(),
            max_connections: 10000,
            read_buffer_size: 1024,
            max_message_size: 1024 * 1024,
            worker_threads: 0,
        }
    }
}

/// Cache engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Command log path (None = no persistence)
    pub log_path: Option<PathBuf>,

    /// When log appends are fsynced
    pub sync_policy: SyncPolicy,

    /// Expiration sweeper period in milliseconds
    pub sweep_interval_ms: u64,

    /// Capacity of the dispatcher's request queue
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_path: Some(PathBuf::from("cache.cashlog")),
            sync_policy: SyncPolicy::Never,
            sweep_interval_ms: 1000,
            queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Config without a command log, for ephemeral caches and tests
    pub fn in_memory() -> Self {
        Self {
            log_path: None,
            ..Self::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Metrics and health check configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Address for metrics/health HTTP server
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9640".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::CashError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::CashError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CASH_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(max_conn) = std::env::var("CASH_MAX_CONNECTIONS")
            && let Ok(n) = max_conn.parse()
        {
            config.server.max_connections = n;
        }

        if let Ok(path) = std::env::var("CASH_LOG_PATH") {
            config.engine.log_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Ok(policy) = std::env::var("CASH_SYNC_POLICY")
            && let Ok(policy) = policy.parse()
        {
            config.engine.sync_policy = policy;
        }

        if let Ok(interval) = std::env::var("CASH_SWEEP_INTERVAL_MS")
            && let Ok(ms) = interval.parse()
        {
            config.engine.sweep_interval_ms = ms;
        }

        if let Ok(addr) = std::env::var("CASH_METRICS_ADDR") {
            config.metrics.listen_addr = addr;
        }

        if let Ok(enabled) = std::env::var("CASH_METRICS_ENABLED") {
            config.metrics.enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        config
    }
}
