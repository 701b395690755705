//! Streaming resource proxy.
//!
//! # Data Flow
//! ```text
//! GET /gw/proxy_view?url=<target>
//!     → request.rs (auth check, url presence, url structure)
//!     → fetch.rs   (HEAD probe, GET, status and declared size checks)
//!     → relay.rs   (chunked, size-limited, backpressured body stream)
//!     → http::response (status + selected headers + streamed body)
//!
//! Any failure before the body starts:
//!     → error.rs (ProxyError → status + message)
//! ```

pub mod error;
pub mod fetch;
pub mod handler;
pub mod relay;
pub mod request;

pub use error::ProxyError;
pub use fetch::{ProbeOutcome, UpstreamClient, UpstreamResponse};
pub use handler::{proxy_resource, proxy_view};
pub use relay::{relay, RelayError, RelayLimits};
pub use request::{validate, ProxyRequest};
