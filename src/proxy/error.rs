//! Caller-facing proxy failures.
//!
//! Every failure is terminal for the call and rendered as a plain-text error
//! response. Nothing here is retried.

use std::error::Error as StdError;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures surfaced by the validator, fetcher and relay setup.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Unauthorized access to proxy.")]
    Unauthenticated,

    #[error("No URL specified")]
    MissingParameter,

    #[error("Invalid URL.")]
    InvalidUrl,

    #[error("Content is too large to be proxied.")]
    TooLarge { content_length: u64, max_size: u64 },

    /// The response that would have been relayed carried a non-success status.
    #[error("Could not proxy resource. Server responded with {}", describe_status(.0))]
    UpstreamHttp(StatusCode),

    #[error("Could not proxy resource because a connection error occurred. {0}")]
    UpstreamConnection(String),

    #[error("Could not proxy resource because the connection timed out.")]
    UpstreamTimeout,
}

impl ProxyError {
    /// Status returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ProxyError::MissingParameter => StatusCode::NOT_FOUND,
            ProxyError::InvalidUrl
            | ProxyError::TooLarge { .. }
            | ProxyError::UpstreamHttp(_) => StatusCode::CONFLICT,
            ProxyError::UpstreamConnection(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Unauthenticated => "unauthenticated",
            ProxyError::MissingParameter => "missing_parameter",
            ProxyError::InvalidUrl => "invalid_url",
            ProxyError::TooLarge { .. } => "too_large",
            ProxyError::UpstreamHttp(_) => "upstream_http",
            ProxyError::UpstreamConnection(_) => "upstream_connection",
            ProxyError::UpstreamTimeout => "upstream_timeout",
        }
    }

    /// Whether the failure was caused by the upstream rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ProxyError::TooLarge { .. }
                | ProxyError::UpstreamHttp(_)
                | ProxyError::UpstreamConnection(_)
                | ProxyError::UpstreamTimeout
        )
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProxyError::UpstreamTimeout
        } else if error.is_builder() {
            // e.g. a scheme reqwest cannot speak
            ProxyError::InvalidUrl
        } else {
            ProxyError::UpstreamConnection(error_chain(&error))
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            self.to_string(),
        )
            .into_response()
    }
}

fn describe_status(status: &StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
