//! Request validation.
//!
//! Turns the raw query string, the caller's authentication context and the
//! incoming `Range` header into a [`ProxyRequest`]. Checks run in a fixed
//! order: authentication, presence of `url`, then URL structure. Only the
//! structure of the URL is checked here; reachability is the fetcher's job.

use axum::http::HeaderValue;
use url::Url;

use crate::auth::AuthContext;
use crate::proxy::error::ProxyError;

/// Name of the query parameter holding the target URL.
pub const URL_PARAM: &str = "url";

/// A validated, immutable proxy call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    target: Url,
    range: Option<HeaderValue>,
    principal: Option<String>,
}

impl ProxyRequest {
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// The caller's `Range` header, forwarded verbatim.
    pub fn range(&self) -> Option<&HeaderValue> {
        self.range.as_ref()
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }
}

/// Extract the first `url` parameter from a raw query string.
pub fn url_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == URL_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Validate an inbound call.
pub fn validate(
    url: Option<&str>,
    auth: &AuthContext,
    range: Option<&HeaderValue>,
) -> Result<ProxyRequest, ProxyError> {
    if !auth.authenticated {
        return Err(ProxyError::Unauthenticated);
    }

    let raw = match url {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(ProxyError::MissingParameter),
    };

    let target = Url::parse(raw).map_err(|_| ProxyError::InvalidUrl)?;
    if target.host_str().map_or(true, str::is_empty) {
        return Err(ProxyError::InvalidUrl);
    }

    Ok(ProxyRequest {
        target,
        range: range.cloned(),
        principal: auth.principal.clone(),
    })
}
