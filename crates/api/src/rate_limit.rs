//! Per-client rate limiting for the frame endpoint
//!
//! GCRA via tower_governor, keyed by peer IP. The server must be run with
//! `into_make_service_with_connect_info::<SocketAddr>()`.

use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config with X-RateLimit-* headers
pub type FrameGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Seconds per replenished request
    pub per_second: u64,
    /// Requests allowed back to back
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // ~30 fps webcam streams from one client
        Self {
            enabled: true,
            per_second: 1,
            burst_size: 30,
        }
    }
}

impl RateLimitConfig {
    /// Occasional snapshots only
    pub fn strict() -> Self {
        Self {
            enabled: true,
            per_second: 2,
            burst_size: 5,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Build the governor config; `None` when disabled or the values are invalid
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<FrameGovernorConfig>> {
    if !config.enabled {
        return None;
    }
    GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.burst_size, 30);
        assert!(create_governor_config(&config).is_some());
    }

    #[test]
    fn test_disabled_has_no_layer() {
        assert!(create_governor_config(&RateLimitConfig::disabled()).is_none());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = RateLimitConfig {
            enabled: true,
            per_second: 0,
            burst_size: 0,
        };
        assert!(create_governor_config(&config).is_none());
    }
}
