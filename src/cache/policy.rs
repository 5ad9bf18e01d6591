//! Which exchanges may touch the shared response cache.
//!
//! The cache is keyed by URI alone and shared by every client, so
//! anything tied to a caller's credentials, or marked private by the
//! upstream, stays out of it.

use axum::http::{header, HeaderMap, Method, StatusCode};

/// Directives that forbid storing a response in a shared cache.
const UNCACHEABLE_DIRECTIVES: &[&str] = &["private", "no-store", "no-cache"];

/// The request may be answered from and stored into the cache.
pub fn request_is_cacheable(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::GET
        && !headers.contains_key(header::AUTHORIZATION)
        && !headers.contains_key(header::COOKIE)
}

/// A cached full body may answer this request.
///
/// Range requests always go upstream; a stored 200 is not a partial answer.
pub fn lookup_allowed(headers: &HeaderMap) -> bool {
    !headers.contains_key(header::RANGE)
}

/// The upstream response may be kept for other clients.
pub fn response_is_storable(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::OK || headers.contains_key(header::SET_COOKIE) {
        return false;
    }

    !headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| {
            UNCACHEABLE_DIRECTIVES
                .iter()
                .any(|d| directive == *d || directive.starts_with(&format!("{}=", d)))
        })
}
