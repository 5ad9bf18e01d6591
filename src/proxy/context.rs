//! Compiled per-configuration request handling state.

use std::time::Duration;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::proxy::{AssetOrigin, ProxyEngine};
use crate::routing::{Router, UrlClassifier, WhiteList};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid upstream pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to build outbound client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Everything a request needs, built from one configuration snapshot.
///
/// Never mutated after construction; a reload builds a new one.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub router: Router,
    pub whitelist: WhiteList,
    pub engine: ProxyEngine,
    pub assets: AssetOrigin,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub cache_enabled: bool,
    pub cache_max_entry_bytes: usize,
}

impl ProxyContext {
    pub fn from_config(config: &ProxyConfig, client: reqwest::Client) -> Result<Self, ContextError> {
        let classifier = UrlClassifier::new(&config.upstream.patterns)?;
        let prefix = config.server.prefix.clone();

        Ok(Self {
            router: Router::new(classifier.clone(), prefix.clone(), config.server.public_scheme.clone()),
            whitelist: WhiteList::new(config.upstream.whitelist.clone()),
            engine: ProxyEngine::new(
                client.clone(),
                classifier,
                prefix,
                config.upstream.max_redirects,
                Duration::from_secs(config.timeouts.upstream_response_secs),
            ),
            assets: AssetOrigin::new(client, config.assets.origin.clone()),
            max_body_bytes: config.server.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            cache_enabled: config.cache.enabled,
            cache_max_entry_bytes: config.cache.max_entry_bytes,
        })
    }
}

/// Shared outbound client: manual redirects, pooled connections.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client, ContextError> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(config.timeouts.connect_secs));
    if !config.upstream.use_system_proxy {
        builder = builder.no_proxy();
    }
    Ok(builder.build()?)
}
