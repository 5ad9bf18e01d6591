//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Route::Upstream(target)
//!     → engine.rs (outbound hop, redirect classification, bounded loop)
//!     → CORS + header stripping on the terminal response
//!
//! Route::Static(path)
//!     → assets.rs (fixed origin + path, verbatim response)
//! ```
//!
//! # Design Decisions
//! - One pooled `reqwest::Client` with redirects disabled serves both paths
//! - Response bodies are streamed, never buffered
//! - `ProxyContext` bundles the compiled config so a reload is one swap

pub mod assets;
pub mod context;
pub mod engine;
pub mod error;

pub use assets::AssetOrigin;
pub use context::{build_client, ContextError, ProxyContext};
pub use engine::{ProxyEngine, ProxyRequest};
pub use error::ProxyError;
