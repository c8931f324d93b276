//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file, and
//! every field has a default so an empty file (or no file) is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::render::Format;
use crate::resilience::RetryPolicy;

/// Root configuration for kvenv.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Where the key/value store lives and how to reach it.
    pub store: StoreConfig,

    /// Include and variable resolution limits.
    pub resolve: ResolveConfig,

    /// Watch mode timings.
    pub watch: WatchConfig,

    /// Rendered output destination and format.
    pub output: OutputConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Store connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store (e.g., "http://localhost:2379"). Any path is ignored.
    pub endpoint: String,

    /// CA certificate (PEM) used to verify the store.
    pub ca_file: Option<PathBuf>,

    /// Client certificate (PEM).
    pub cert_file: Option<PathBuf>,

    /// Private key (PEM) for the client certificate.
    pub key_file: Option<PathBuf>,

    /// Timeout in seconds for connecting and for each non-watch read.
    /// Watches use `watch.timeout_secs` instead.
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:2379".to_string(),
            ca_file: None,
            cert_file: None,
            key_file: None,
            request_timeout_secs: 10,
        }
    }
}

/// Resolution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Longest allowed include chain.
    pub include_max_depth: usize,

    /// Longest allowed variable reference chain.
    pub expand_max_depth: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            include_max_depth: crate::environment::MAX_DEPTH_DEFAULT,
            expand_max_depth: crate::expand::MAX_DEPTH_DEFAULT,
        }
    }
}

/// Watch mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Long-poll timeout per watch request in seconds.
    pub timeout_secs: u64,

    /// First backoff delay after a failure in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound for backoff delays in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            backoff_base_ms: 100,
            backoff_max_ms: 300_000,
        }
    }
}

impl WatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination file; stdout when unset.
    pub path: Option<PathBuf>,

    /// Permission bits for the destination file.
    pub mode: u32,

    /// Line format.
    pub format: Format,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            mode: 0o600,
            format: Format::Dotenv,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Prometheus exporter bind address; disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "kvenv=info".to_string(),
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.store.endpoint, "http://localhost:2379");
        assert_eq!(settings.resolve.include_max_depth, 10);
        assert_eq!(settings.resolve.expand_max_depth, 50);
        assert_eq!(settings.watch.timeout(), Duration::from_secs(120));
        assert_eq!(settings.output.mode, 0o600);
        assert_eq!(settings.output.format, Format::Dotenv);
    }

    #[test]
    fn test_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [store]
            endpoint = "https://etcd:2379"

            [output]
            format = "docker"
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.endpoint, "https://etcd:2379");
        assert_eq!(settings.store.request_timeout_secs, 10);
        assert_eq!(settings.output.format, Format::Docker);
        assert_eq!(settings.watch.backoff_base_ms, 100);
    }
}
