//! # Gateway Configuration
//!
//! Retry delays and polling intervals of the chain gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Chain gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Node endpoint, used by the HTTP adapter.
    pub endpoint: String,

    /// Fixed delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// How often the watchdog checks the connection, in milliseconds.
    pub watchdog_interval_ms: u64,

    /// Polling interval for call statuses and new heads, in milliseconds.
    pub poll_interval_ms: u64,

    /// Per-request timeout, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9933".to_string(),
            reconnect_delay_ms: 6_000,
            watchdog_interval_ms: 30_000,
            poll_interval_ms: 1_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl GatewayConfig {
    /// Create a config for testing (short delays).
    pub fn for_testing() -> Self {
        Self {
            endpoint: "http://127.0.0.1:0".to_string(),
            reconnect_delay_ms: 10,
            watchdog_interval_ms: 50,
            poll_interval_ms: 10,
            request_timeout_ms: 1_000,
        }
    }

    /// Reconnect delay as a `Duration`.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Watchdog interval as a `Duration`.
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.reconnect_delay(), Duration::from_secs(6));
        assert!(config.watchdog_interval() > config.poll_interval());
    }

    #[test]
    fn test_testing_config_is_fast() {
        let config = GatewayConfig::for_testing();
        assert!(config.reconnect_delay() < Duration::from_secs(1));
    }
}
