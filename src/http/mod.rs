//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route table)
//!     → request.rs (request ID)
//!     → auth middleware (AuthContext)
//!     → proxy::handler
//!     → response.rs (status, forwarded headers, streamed body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, InnerState, PROXY_VIEW_PATH};
