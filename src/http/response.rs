//! Caller response construction.
//!
//! The upstream status is kept as is, so a 206 from a honored `Range` reaches
//! the caller unchanged. Only `Content-Type`, `Content-Length` and
//! `Content-Range` are copied from upstream; everything else is dropped.

use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};

use crate::proxy::fetch::UpstreamResponse;
use crate::proxy::relay::{relay, RelayLimits};

/// Build the streamed response for a successful fetch.
pub fn relay_response(upstream: UpstreamResponse, limits: RelayLimits) -> Response {
    let UpstreamResponse {
        status,
        content_type,
        content_length,
        content_range,
        body,
    } = upstream;

    let mut response = Response::new(Body::from_stream(relay(body, limits)));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    if let Some(content_length) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    }
    if let Some(content_range) = content_range {
        headers.insert(header::CONTENT_RANGE, content_range);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    response
}
