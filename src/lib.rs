//! GitHub edge proxy library.
//!
//! Forwards allow-listed GitHub URLs (raw files, releases, archives, gists,
//! git smart-HTTP) through a single host with permissive CORS, and serves
//! every other path from a static asset origin.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
