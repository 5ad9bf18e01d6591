//! Upstream forwarding with redirect inspection.
//!
//! The outbound client never follows redirects on its own. Each response
//! carrying a `Location` is classified:
//!
//! ```text
//! Location matches allow-list → rewrite to <prefix><location>, hand to client
//! Location is foreign         → resolve against current URL, fetch again
//! no Location                 → terminal response
//! ```
//!
//! Foreign hops are followed in a bounded loop; every hop is classified
//! again, so a chain may leave and re-enter the allow-list.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method},
    response::Response,
};
use url::Url;

use crate::http::response::{apply_cors, strip_hop_by_hop};
use crate::observability::metrics;
use crate::proxy::ProxyError;
use crate::routing::UrlClassifier;

/// A request replayable against every hop of a redirect chain.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Forwards requests to allow-listed upstreams.
#[derive(Debug, Clone)]
pub struct ProxyEngine {
    client: reqwest::Client,
    classifier: UrlClassifier,
    prefix: String,
    max_redirects: usize,
    response_timeout: Duration,
}

impl ProxyEngine {
    pub fn new(
        client: reqwest::Client,
        classifier: UrlClassifier,
        prefix: impl Into<String>,
        max_redirects: usize,
        response_timeout: Duration,
    ) -> Self {
        Self {
            client,
            classifier,
            prefix: prefix.into(),
            max_redirects,
            response_timeout,
        }
    }

    /// Fetch `target`, following foreign redirects server-side.
    pub async fn forward(&self, target: Url, request: &ProxyRequest) -> Result<Response, ProxyError> {
        let mut url = target;
        let mut hops = 0;

        loop {
            let upstream = self.send(&url, request).await?;

            let Some(location) = location(upstream.headers()) else {
                return Ok(finish(upstream, None));
            };

            if self.classifier.matches(&location) {
                let rewritten = format!("{}{}", self.prefix, location);
                tracing::debug!(
                    from = %url,
                    location = %location,
                    rewritten = %rewritten,
                    "Rewriting allow-listed redirect"
                );
                metrics::record_redirect("rewritten");
                return Ok(finish(upstream, Some(rewritten)));
            }

            hops += 1;
            if hops > self.max_redirects {
                metrics::record_redirect("exhausted");
                return Err(ProxyError::TooManyRedirects(self.max_redirects));
            }

            let next = url
                .join(&location)
                .map_err(|_| ProxyError::InvalidRedirect(location.clone()))?;
            if !matches!(next.scheme(), "http" | "https") {
                return Err(ProxyError::InvalidRedirect(location));
            }

            tracing::debug!(
                from = %url,
                to = %next,
                hop = hops,
                status = upstream.status().as_u16(),
                "Following foreign redirect"
            );
            metrics::record_redirect("followed");
            url = next;
        }
    }

    /// One outbound hop, bounded by the response timeout.
    async fn send(&self, url: &Url, request: &ProxyRequest) -> Result<reqwest::Response, ProxyError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        match tokio::time::timeout(self.response_timeout, builder.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProxyError::UpstreamTimeout(self.response_timeout)),
        }
    }
}

/// Readable `Location` header value, if any.
fn location(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Turn an upstream response into the client response, streaming the body.
fn finish(upstream: reqwest::Response, location: Option<String>) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();

    if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
        headers.insert(header::LOCATION, value);
    }
    strip_hop_by_hop(&mut headers);
    apply_cors(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_ignores_empty_and_missing() {
        let mut headers = HeaderMap::new();
        assert_eq!(location(&headers), None);

        headers.insert(header::LOCATION, HeaderValue::from_static(""));
        assert_eq!(location(&headers), None);

        headers.insert(
            header::LOCATION,
            HeaderValue::from_static("https://objects.githubusercontent.com/x"),
        );
        assert_eq!(
            location(&headers).as_deref(),
            Some("https://objects.githubusercontent.com/x")
        );
    }
}
