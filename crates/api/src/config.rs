//! Server configuration
//!
//! Loaded from an optional TOML file, then overridden by `FER__`-prefixed
//! environment variables (`FER__SERVER__BIND_ADDR`, `FER__MQTT__HOST`, ...).

use ensemble::EnsembleSpec;
use event_sync::SyncConfig;
use face_frame::DetectorConfig;
use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitConfig;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// tracing level filter: error, warn, info, debug, trace
    pub log_level: String,
    /// JSON log lines instead of the human-readable format
    pub json_logs: bool,
    /// Upper bound for detection plus fusion of one frame
    pub request_timeout_ms: u64,
    /// Largest accepted image upload
    pub max_body_bytes: usize,
    /// Apply majority-vote smoothing unless the request says otherwise
    pub smoothing_default: bool,
    /// Expose Prometheus metrics on /metrics
    pub metrics: bool,
    /// Live sessions kept before the least recently used is evicted
    pub max_sessions: usize,
    /// Seconds without a frame before a session is dropped
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            request_timeout_ms: 5000,
            max_body_bytes: 10 * 1024 * 1024,
            smoothing_default: true,
            metrics: true,
            max_sessions: 10_000,
            session_idle_secs: 30 * 60,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ensemble: EnsembleSpec,
    pub detector: DetectorConfig,
    pub rate_limit: RateLimitConfig,
    /// Event publishing; disabled when absent
    pub mqtt: Option<SyncConfig>,
    /// Use scripted classifiers instead of loading ONNX models
    pub mock_models: bool,
}

impl AppConfig {
    /// Load from `path` (if given and present) plus the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder
            .add_source(
                config::Environment::with_prefix("FER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.request_timeout_ms, 5000);
        assert_eq!(config.ensemble.models.len(), 2);
        assert!(config.mqtt.is_none());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/fer-server")).is_ok());
    }

    #[test]
    fn test_toml_file() {
        let path = std::env::temp_dir().join(format!("fer-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
mock_models = true

[server]
bind_addr = "127.0.0.1:9000"
json_logs = true
max_sessions = 50

[rate_limit]
per_second = 1
burst_size = 20

[mqtt]
host = "broker.local"
topic = "lab/fer"
"#
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(config.mock_models);
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert!(config.server.json_logs);
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.max_sessions, 50);
        assert_eq!(config.server.session_idle_secs, 1800);
        assert_eq!(config.rate_limit.burst_size, 20);
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.topic, "lab/fer");
        assert_eq!(mqtt.port, 1883);
    }
}
