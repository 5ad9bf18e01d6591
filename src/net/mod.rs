//! Network layer subsystem.
//!
//! Plain TCP listening is handled by `axum::serve`; this module only adds
//! optional TLS termination via `axum-server` and rustls.

pub mod tls;
