//! Configuration validation.
//!
//! Serde handles the syntactic side; these checks cover value ranges,
//! URL shapes and pattern compilation. Every problem is reported, not
//! just the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::routing::matcher::UrlClassifier;

const MAX_REDIRECT_LIMIT: usize = 32;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let prefix = &config.server.prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') {
        errors.push(ValidationError::new(
            "server.prefix",
            format!("'{}' must start and end with '/'", prefix),
        ));
    }

    if !matches!(config.server.public_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "server.public_scheme",
            "must be 'http' or 'https'",
        ));
    }

    match Url::parse(&config.assets.origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if !config.assets.origin.ends_with('/') {
                errors.push(ValidationError::new("assets.origin", "must end with '/'"));
            }
        }
        Ok(url) => errors.push(ValidationError::new(
            "assets.origin",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("assets.origin", e.to_string())),
    }

    if config.upstream.patterns.is_empty() {
        errors.push(ValidationError::new("upstream.patterns", "at least one pattern is required"));
    } else if let Err(e) = UrlClassifier::new(&config.upstream.patterns) {
        errors.push(ValidationError::new("upstream.patterns", e.to_string()));
    }

    if config.upstream.whitelist.iter().any(|entry| entry.is_empty()) {
        errors.push(ValidationError::new(
            "upstream.whitelist",
            "entries must not be empty",
        ));
    }

    if config.upstream.max_redirects == 0 || config.upstream.max_redirects > MAX_REDIRECT_LIMIT {
        errors.push(ValidationError::new(
            "upstream.max_redirects",
            format!("must be between 1 and {}", MAX_REDIRECT_LIMIT),
        ));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.upstream_response_secs", timeouts.upstream_response_secs),
        ("timeouts.request_secs", timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if timeouts.request_secs < timeouts.upstream_response_secs {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be at least timeouts.upstream_response_secs",
        ));
    }

    if config.cache.enabled {
        let cache = &config.cache;
        for (field, value) in [
            ("cache.ttl_secs", cache.ttl_secs as usize),
            ("cache.max_entries", cache.max_entries),
            ("cache.max_entry_bytes", cache.max_entry_bytes),
            ("cache.queue_capacity", cache.queue_capacity),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(field, "must be greater than zero"));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
