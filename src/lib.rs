//! Authenticated streaming resource proxy.
//!
//! Fetches a remote resource on behalf of an authenticated caller and relays
//! it as a streamed HTTP response, enforcing a maximum size and forwarding
//! `Range` requests.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
