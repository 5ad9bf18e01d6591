//! Static asset origin.
//!
//! Paths that are not allow-listed upstreams belong to the site's own
//! front end. They are forwarded to a fixed origin with the request's
//! method, headers and body, and the answer is returned verbatim.

use axum::{body::Body, response::Response};
use url::Url;

use crate::http::response::strip_hop_by_hop;
use crate::proxy::{ProxyError, ProxyRequest};

#[derive(Debug, Clone)]
pub struct AssetOrigin {
    client: reqwest::Client,
    origin: String,
}

impl AssetOrigin {
    /// `origin` must end with `/`; paths are appended to it as-is.
    pub fn new(client: reqwest::Client, origin: impl Into<String>) -> Self {
        Self {
            client,
            origin: origin.into(),
        }
    }

    /// Absolute URL for a request remainder.
    ///
    /// Concatenation, not URL joining: a remainder that looks like an
    /// absolute URL must still land on the asset origin.
    pub fn url_for(&self, path: &str) -> Result<Url, ProxyError> {
        let raw = format!("{}{}", self.origin, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|_| ProxyError::InvalidUrl(raw))
    }

    pub async fn fetch(&self, path: &str, request: ProxyRequest) -> Result<Response, ProxyError> {
        let url = self.url_for(path)?;
        tracing::debug!(url = %url, "Fetching static asset");

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }
        let upstream = builder.send().await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
