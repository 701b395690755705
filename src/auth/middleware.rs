use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

/// Attach an [`AuthContext`](crate::auth::AuthContext) to every request.
///
/// Rejection happens later, in the proxy validator, so that the 401 is
/// produced by the same code path as every other proxy failure.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let inner = state.snapshot();
    let ctx = inner.authenticator.authenticate(request.headers());

    if let Some(principal) = &ctx.principal {
        tracing::trace!(principal = %principal, "Caller authenticated");
    }

    request.extensions_mut().insert(ctx);
    next.run(request).await
}
