//! Upstream fetching.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → HEAD target (User-Agent + forwarded Range)
//!     → ProbeOutcome::classify(status)
//!         Proceed       → GET target, stream body
//!         FallbackToGet → GET target, stream body (HEAD rejected by server)
//!         Failed        → UpstreamHttp error, no GET
//!     → final status must be 2xx
//!     → Content-Length checked against max size before any byte is read
//!     → UpstreamResponse (body still unread)
//! ```
//!
//! A HEAD response is never relayed; it carries no body.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;

use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::request::ProxyRequest;

/// Desktop browser identity. Some servers refuse requests without one.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.72 Safari/537.36";

/// HEAD statuses that mean "this server does not do HEAD for this resource",
/// answered by going straight to GET.
pub const HEAD_FALLBACK_STATUSES: [StatusCode; 3] = [
    StatusCode::BAD_REQUEST,
    StatusCode::FORBIDDEN,
    StatusCode::METHOD_NOT_ALLOWED,
];

/// What to do after the HEAD probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// HEAD succeeded; fetch the body with a GET.
    Proceed,
    /// HEAD was rejected in a recognized way; the GET response is authoritative.
    FallbackToGet,
    /// HEAD failed with any other error status.
    Failed(StatusCode),
}

impl ProbeOutcome {
    pub fn classify(status: StatusCode) -> Self {
        if HEAD_FALLBACK_STATUSES.contains(&status) {
            ProbeOutcome::FallbackToGet
        } else if status.is_client_error() || status.is_server_error() {
            ProbeOutcome::Failed(status)
        } else {
            ProbeOutcome::Proceed
        }
    }
}

/// Response whose body has not been read yet.
///
/// Dropping it closes the upstream connection.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<u64>,
    pub content_range: Option<HeaderValue>,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

impl UpstreamResponse {
    fn from_reqwest(response: reqwest::Response) -> Self {
        let headers = response.headers();
        let content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            status: response.status(),
            content_type: headers.get(header::CONTENT_TYPE).cloned(),
            content_length,
            content_range: headers.get(header::CONTENT_RANGE).cloned(),
            body: response.bytes_stream().boxed(),
        }
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

/// HTTP client for upstream resources.
///
/// Built from one [`ProxyConfig`]; a configuration reload builds a new one.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeout())
            .pool_idle_timeout(Duration::from_secs(90));

        match config.download_proxy.as_deref().filter(|p| !p.is_empty()) {
            Some(proxy) => {
                builder = builder.proxy(reqwest::Proxy::all(proxy)?);
                tracing::info!(proxy = %proxy, "Using outbound download proxy");
            }
            None => builder = builder.no_proxy(),
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Fetch the target, returning the response whose body will be relayed.
    pub async fn fetch(
        &self,
        request: &ProxyRequest,
        config: &ProxyConfig,
    ) -> Result<UpstreamResponse, ProxyError> {
        let headers = outbound_headers(request);
        let timeout = config.timeout();

        let head = self.send(Method::HEAD, request, &headers, timeout).await?;
        let outcome = ProbeOutcome::classify(head.status());
        drop(head);

        let response = match outcome {
            ProbeOutcome::Proceed => self.send(Method::GET, request, &headers, timeout).await?,
            ProbeOutcome::FallbackToGet => {
                tracing::debug!(url = %request.target(), "HEAD rejected, falling back to GET");
                self.send(Method::GET, request, &headers, timeout).await?
            }
            ProbeOutcome::Failed(status) => return Err(ProxyError::UpstreamHttp(status)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamHttp(status));
        }

        let upstream = UpstreamResponse::from_reqwest(response);
        check_declared_size(upstream.content_length, config.max_size())?;
        Ok(upstream)
    }

    async fn send(
        &self,
        method: Method,
        request: &ProxyRequest,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<reqwest::Response, ProxyError> {
        metrics::record_upstream_request(&method);
        tracing::trace!(method = %method, url = %request.target(), "Sending upstream request");

        let pending = self
            .http_client
            .request(method, request.target().clone())
            .headers(headers.clone())
            .send();
        with_deadline(timeout, pending).await
    }
}

/// Headers sent with both HEAD and GET.
pub fn outbound_headers(request: &ProxyRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    if let Some(range) = request.range() {
        headers.insert(header::RANGE, range.clone());
    }
    headers
}

/// Reject before streaming when the upstream declares an oversized body.
pub fn check_declared_size(
    content_length: Option<u64>,
    max_size: Option<u64>,
) -> Result<(), ProxyError> {
    match (content_length, max_size) {
        (Some(content_length), Some(max_size)) if content_length > max_size => {
            Err(ProxyError::TooLarge {
                content_length,
                max_size,
            })
        }
        _ => Ok(()),
    }
}

async fn with_deadline<F>(timeout: Duration, pending: F) -> Result<reqwest::Response, ProxyError>
where
    F: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    match tokio::time::timeout(timeout, pending).await {
        Ok(result) => result.map_err(ProxyError::from),
        Err(_) => Err(ProxyError::UpstreamTimeout),
    }
}
