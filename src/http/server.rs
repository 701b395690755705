//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router from an explicit route table
//! - Wire up middleware (authentication, timeout, request ID, tracing)
//! - Hold the per-configuration runtime snapshot and swap it on reload
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{self, ApiKeyAuthenticator, Authenticator};
use crate::config::AppConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::proxy::{proxy_view, UpstreamClient};

/// Route serving proxied resources.
pub const PROXY_VIEW_PATH: &str = "/gw/proxy_view";

/// Everything a call needs, built from one configuration.
pub struct InnerState {
    pub config: AppConfig,
    pub upstream: UpstreamClient,
    pub authenticator: Arc<dyn Authenticator>,
}

impl InnerState {
    pub fn from_config(config: AppConfig) -> Result<Self, reqwest::Error> {
        let upstream = UpstreamClient::new(&config.proxy)?;
        let authenticator = Arc::new(ApiKeyAuthenticator::new(&config.auth));
        Ok(Self {
            config,
            upstream,
            authenticator,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<InnerState>>,
}

impl AppState {
    pub fn new(inner: InnerState) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(inner)),
        }
    }

    /// The current runtime snapshot. Stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<InnerState> {
        self.inner.load_full()
    }

    /// Swap in a new configuration. A configuration that cannot produce a
    /// client is logged and ignored.
    pub fn apply(&self, config: AppConfig) {
        match InnerState::from_config(config) {
            Ok(inner) => {
                tracing::info!(
                    timeout_secs = inner.config.proxy.timeout_secs,
                    chunk_size = inner.config.proxy.chunk_size,
                    max_file_size = inner.config.proxy.max_file_size,
                    download_proxy = ?inner.config.proxy.download_proxy,
                    "Configuration applied"
                );
                self.inner.store(Arc::new(inner));
            }
            Err(e) => {
                tracing::error!(error = %e, "Rejected configuration update. Keeping current configuration.");
            }
        }
    }
}

/// HTTP server for the resource proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let state = AppState::new(InnerState::from_config(config)?);
        let router = Self::build_router(state.clone(), request_timeout);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route(PROXY_VIEW_PATH, get(proxy_view))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            ))
            .route("/healthz", get(health))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Handle to the shared state, for applying configuration out of band.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` are applied as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let reloads = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.apply(config);
            }
        });

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await;

        reloads.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
