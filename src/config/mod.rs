//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → wrapped in a runtime snapshot shared via ArcSwap
//!
//! On file change or SIGHUP:
//!     watcher.rs reloads the file
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the snapshot atomically
//!     → new calls observe the new config, in-flight calls keep theirs
//! ```

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    AppConfig, AuthConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig,
};
pub use watcher::ConfigWatcher;
