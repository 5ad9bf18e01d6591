//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, host)
//!     → router.rs (strip mount point, handle ?q=, repair scheme)
//!     → matcher.rs (allow-list check on the normalized target)
//!     → Return: CanonicalRedirect | Upstream | Static
//!
//! Compilation (at startup and on reload):
//!     upstream.patterns
//!     → RegexSet (case-insensitive)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Patterns compiled once, immutable at runtime
//! - Deterministic: same input always yields the same route
//! - The classifier is shared with the proxy engine for redirect hops

pub mod matcher;
pub mod router;

pub use matcher::{UrlClassifier, WhiteList, DEFAULT_PATTERNS};
pub use router::{normalize_target, Route, Router};
