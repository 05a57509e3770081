//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Chunk size in bytes, fixed for every session.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Maximum declared upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Base URL prepended to artifact paths to form public URLs.
    /// When unset, complete responses carry no URL.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Session expiry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Inactivity window in seconds after which a session and its chunks are
    /// reclaimed (default: 24 hours).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Interval between sweep runs in seconds (default: 15 minutes).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for chunk blobs and assembled artifacts.
        path: PathBuf,
    },
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_chunk_size() -> u64 {
    crate::CHUNK_SIZE
}

fn default_max_upload_bytes() -> u64 {
    crate::MAX_UPLOAD_BYTES
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_session_ttl_secs() -> u64 {
    86400 // 24 hours
}

fn default_sweep_interval_secs() -> u64 {
    900 // 15 minutes
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            chunk_size: default_chunk_size(),
            max_upload_bytes: default_max_upload_bytes(),
            public_base_url: None,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SweepConfig {
    /// Inactivity window as a Duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Sweep cadence as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        // Guard against a zero interval, which tokio::time::interval rejects.
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl AppConfig {
    /// Create a configuration suitable for tests, storing under `path`.
    ///
    /// **For testing only.**
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem { path: path.into() },
            sweep: SweepConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.chunk_size, 524_288);
        assert_eq!(config.max_upload_bytes, 41_943_040);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_sweep_config_durations() {
        let sweep = SweepConfig::default();
        assert_eq!(sweep.session_ttl(), Duration::from_secs(86400));
        assert_eq!(sweep.sweep_interval(), Duration::from_secs(900));

        let zero = SweepConfig {
            session_ttl_secs: 0,
            sweep_interval_secs: 0,
        };
        assert_eq!(zero.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_app_config_from_toml() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:9000"

            [storage]
            type = "filesystem"
            path = "/var/lib/depot"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.chunk_size, crate::CHUNK_SIZE);
        let StorageConfig::Filesystem { path } = config.storage;
        assert_eq!(path, PathBuf::from("/var/lib/depot"));
    }
}
