//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): proxy calls by caller-facing status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_upstream_requests_total` (counter): outbound requests by method
//! - `proxy_bytes_relayed_total` (counter): body bytes handed to callers
//! - `proxy_truncated_total` (counter): bodies cut by the size limit
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start_time: Instant) {
    counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
    histogram!("proxy_request_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_upstream_request(method: &Method) {
    counter!("proxy_upstream_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_relayed_bytes(bytes: u64) {
    counter!("proxy_bytes_relayed_total").increment(bytes);
}

pub fn record_truncated() {
    counter!("proxy_truncated_total").increment(1);
}
