use axum::http::{header, HeaderMap};

use crate::auth::{AuthContext, Authenticator};
use crate::config::AuthConfig;

/// Bearer API key authentication.
///
/// A caller is authenticated when `Authorization: Bearer <key>` matches one of
/// the configured keys, or when anonymous access is enabled.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    api_keys: Vec<String>,
    allow_anonymous: bool,
}

impl ApiKeyAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            api_keys: config
                .api_keys
                .iter()
                .filter(|key| !key.is_empty())
                .cloned()
                .collect(),
            allow_anonymous: config.allow_anonymous,
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> AuthContext {
        if let Some(token) = Self::bearer_token(headers) {
            if let Some(index) = self.api_keys.iter().position(|key| key == token) {
                return AuthContext::authenticated(format!("api-key#{}", index));
            }
        }

        if self.allow_anonymous {
            AuthContext {
                authenticated: true,
                principal: None,
            }
        } else {
            AuthContext::anonymous()
        }
    }
}
