//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every problem is reported, not just the first one.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("proxy.timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("proxy.chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("proxy.download_proxy '{0}' is not a valid URL")]
    DownloadProxy(String),

    #[error("timeouts.request_secs ({request_secs}) must exceed twice proxy.timeout_secs ({proxy_secs})")]
    RequestDeadline { request_secs: u64, proxy_secs: u64 },

    #[error("auth.api_keys is empty and anonymous access is disabled")]
    NoCredentials,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let proxy = &config.proxy;
    if proxy.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if proxy.chunk_size == 0 {
        errors.push(ValidationError::ZeroChunkSize);
    }
    if let Some(download_proxy) = &proxy.download_proxy {
        if url::Url::parse(download_proxy).is_err() {
            errors.push(ValidationError::DownloadProxy(download_proxy.clone()));
        }
    }

    // HEAD and GET are sent back to back before headers can be produced.
    if config.timeouts.request_secs <= proxy.timeout_secs.saturating_mul(2) {
        errors.push(ValidationError::RequestDeadline {
            request_secs: config.timeouts.request_secs,
            proxy_secs: proxy.timeout_secs,
        });
    }

    if config.auth.api_keys.is_empty() && !config.auth.allow_anonymous {
        errors.push(ValidationError::NoCredentials);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
