//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resource proxy service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream fetch and relay settings.
    pub proxy: ProxyConfig,

    /// Caller authentication.
    pub auth: AuthConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Settings consumed by every proxy call.
///
/// A snapshot of this struct is taken once per call; reloads never affect a
/// call that is already in flight.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream request timeout in seconds. Bounds each HEAD/GET and each
    /// body read.
    pub timeout_secs: u64,

    /// Size of the chunks relayed to the caller, in bytes.
    pub chunk_size: usize,

    /// Maximum remote file size in bytes. 0 means unlimited.
    pub max_file_size: u64,

    /// Optional outbound forwarding proxy, used for both HTTP and HTTPS targets.
    pub download_proxy: Option<String>,
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The byte budget, or `None` when unlimited.
    pub fn max_size(&self) -> Option<u64> {
        (self.max_file_size > 0).then_some(self.max_file_size)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            chunk_size: 4096,
            max_file_size: 0,
            download_proxy: None,
        }
    }
}

/// Caller authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted API keys (sent as `Authorization: Bearer <key>`).
    pub api_keys: Vec<String>,

    /// Treat every caller as authenticated. Development only.
    pub allow_anonymous: bool,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for producing response headers, in seconds. Body streaming is
    /// not bounded by this value.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.proxy.timeout_secs, 5);
        assert_eq!(config.proxy.chunk_size, 4096);
        assert_eq!(config.proxy.max_size(), None);
        assert!(config.proxy.download_proxy.is_none());
        assert!(!config.auth.allow_anonymous);
    }

    #[test]
    fn test_partial_proxy_section() {
        let config: AppConfig = toml::from_str(
            r#"
            [proxy]
            max_file_size = 500000
            download_proxy = "http://squid.internal:3128"
            "#,
        )
        .unwrap();
        assert_eq!(config.proxy.max_size(), Some(500_000));
        assert_eq!(config.proxy.chunk_size, 4096);
        assert_eq!(config.proxy.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.proxy.download_proxy.as_deref(),
            Some("http://squid.internal:3128")
        );
    }
}
