//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler, fetcher and relay produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! Request IDs are attached in `http::request` and show up in the
//! tower-http trace spans.

pub mod logging;
pub mod metrics;
