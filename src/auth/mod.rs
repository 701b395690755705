//! Caller authentication.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → middleware.rs (ask the Authenticator, attach AuthContext)
//!     → handler extracts AuthContext (absent = anonymous)
//!     → proxy::request::validate rejects anonymous callers with 401
//! ```
//!
//! The proxy itself never decides who a caller is. It only consumes the
//! `authenticated` fact produced by whatever [`Authenticator`] the host wires in.

pub mod api_key;
pub mod middleware;

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub use api_key::ApiKeyAuthenticator;
pub use middleware::authenticate;

/// Per-call authentication context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub authenticated: bool,
    /// Identifier of the caller, used only for logging.
    pub principal: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            principal: Some(principal.into()),
        }
    }
}

/// Decides whether the caller behind a request is authenticated.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> AuthContext;
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}
