//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into a ProxyContext shared via Arc
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new ProxyContext swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener, outbound client and cache sizing are fixed at startup;
//!   routing, allow-list, whitelist and redirect policy follow reloads

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AssetsConfig, CacheConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    ServerConfig, TimeoutConfig, TlsConfig, UpstreamConfig,
};
pub use validation::ValidationError;
