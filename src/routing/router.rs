//! Request target extraction and route decision.
//!
//! # Responsibilities
//! - Strip the mount point from the request URI
//! - Turn `?q=<url>` invocations into a canonical redirect
//! - Repair malformed scheme markers and default to `https://`
//! - Decide between proxying upstream and serving a static asset
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Static assets receive the original remainder, never the normalized
//!   candidate, so scheme repair cannot redirect asset fetches elsewhere

use std::sync::LazyLock;

use axum::http::Uri;
use regex::Regex;

use crate::routing::matcher::UrlClassifier;

static SCHEME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?:?/*").expect("scheme marker regex must compile"));

/// Outcome of resolving a request URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Answer with a 301 to this location instead of proxying.
    CanonicalRedirect(String),
    /// Proxy to this normalized absolute target.
    Upstream { target: String },
    /// Serve `path` (the untouched remainder) from the static origin.
    Static { path: String },
}

impl Route {
    /// Metrics label for the route.
    pub fn kind(&self) -> &'static str {
        match self {
            Route::CanonicalRedirect(_) => "redirect",
            Route::Upstream { .. } => "upstream",
            Route::Static { .. } => "static",
        }
    }
}

/// Maps request URIs to routes.
#[derive(Debug, Clone)]
pub struct Router {
    classifier: UrlClassifier,
    prefix: String,
    public_scheme: String,
}

impl Router {
    pub fn new(
        classifier: UrlClassifier,
        prefix: impl Into<String>,
        public_scheme: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            prefix: prefix.into(),
            public_scheme: public_scheme.into(),
        }
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a request URI. `host` is the inbound `Host` header, used for
    /// canonical redirects.
    pub fn resolve(&self, uri: &Uri, host: Option<&str>) -> Route {
        if let Some(q) = uri.query().and_then(query_target) {
            return Route::CanonicalRedirect(self.canonical_location(host, &q));
        }

        let remainder = self.remainder(uri);
        let target = normalize_target(remainder);

        if self.classifier.matches(&target) {
            Route::Upstream { target }
        } else {
            Route::Static {
                path: remainder.to_string(),
            }
        }
    }

    /// Path and query after the mount point.
    ///
    /// A path outside the mount point (e.g. `/gh` under prefix `/gh/`) only
    /// loses its leading slashes, so it normally ends up at the static origin.
    fn remainder<'a>(&self, uri: &'a Uri) -> &'a str {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        path_and_query
            .strip_prefix(self.prefix.as_str())
            .unwrap_or_else(|| path_and_query.trim_start_matches('/'))
    }

    fn canonical_location(&self, host: Option<&str>, q: &str) -> String {
        let q = q.trim_start_matches('/');
        match host {
            Some(host) => format!("{}://{}{}{}", self.public_scheme, host, self.prefix, q),
            None => format!("{}{}", self.prefix, q),
        }
    }
}

/// Value of a non-empty `q` query parameter.
fn query_target(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Repair a leading scheme marker and make the candidate absolute.
///
/// `http:/x`, `https:///x`, `httpsx` and `http://x` all become `https://x`;
/// scheme-less candidates get `https://` prepended.
pub fn normalize_target(candidate: &str) -> String {
    match SCHEME_MARKER.find(candidate) {
        Some(marker) => format!("https://{}", &candidate[marker.end()..]),
        None => format!("https://{}", candidate),
    }
}
