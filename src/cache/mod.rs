//! Best-effort response cache.
//!
//! # Data Flow
//! ```text
//! GET request → policy.rs (no credentials, no Range)
//!     → store.rs lookup (fresh hit short-circuits the proxy)
//!
//! Proxied 200 response, not private/no-store, no Set-Cookie
//!     → writer.rs tee (chunks copied while streaming to the client)
//!     → bounded mpsc queue (try_send, drop when full)
//!     → CacheWorker → store.rs insert
//! ```
//!
//! # Design Decisions
//! - Writes never block or fail the response path
//! - Keyed by request URI; same key always maps to an equivalent value
//! - Credentialed requests and private responses never enter the cache
//! - TTL and entry count bounded; oversized bodies are never cached

pub mod policy;
pub mod store;
pub mod writer;

pub use store::{CachedResponse, ResponseCache};
pub use writer::{CacheWorker, CacheWriter};
