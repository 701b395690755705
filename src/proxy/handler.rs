//! The `GET /gw/proxy_view` handler.

use std::time::Instant;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::auth::AuthContext;
use crate::http::request::request_id;
use crate::http::response::relay_response;
use crate::http::server::{AppState, InnerState};
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::relay::RelayLimits;
use crate::proxy::request::{url_param, validate};

/// Proxy the resource named by the `url` query parameter.
pub async fn proxy_view(
    State(state): State<AppState>,
    auth: AuthContext,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    // One snapshot for the whole call; reloads only affect later calls.
    let inner = state.snapshot();
    let request_id = request_id(&headers);

    let url = url_param(query.as_deref());
    let response = match proxy_resource(&inner, &auth, url.as_deref(), headers.get(header::RANGE))
        .await
    {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                status = %response.status(),
                "Relaying upstream response"
            );
            response
        }
        Err(e) => {
            if e.is_upstream() {
                tracing::warn!(request_id = %request_id, url = ?url, kind = e.kind(), error = %e, "Proxy failed");
            } else {
                tracing::debug!(request_id = %request_id, kind = e.kind(), "Proxy request rejected");
            }
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}

/// Validate, fetch and start relaying one resource.
pub async fn proxy_resource(
    inner: &InnerState,
    auth: &AuthContext,
    url: Option<&str>,
    range: Option<&HeaderValue>,
) -> Result<Response, ProxyError> {
    let request = validate(url, auth, range)?;
    tracing::debug!(
        url = %request.target(),
        range = ?request.range(),
        principal = ?request.principal(),
        "Proxying resource"
    );

    let config = &inner.config.proxy;
    let upstream = inner.upstream.fetch(&request, config).await?;
    Ok(relay_response(upstream, RelayLimits::from(config)))
}
