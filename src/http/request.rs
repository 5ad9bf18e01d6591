//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Prepare inbound headers for forwarding upstream
//! - Buffer the request body (bounded) so redirect hops can replay it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - `host` and framing headers are dropped; the outbound client sets
//!   them for the actual target
//! - Size limit enforced from `content-length` before reading the body

use axum::{
    body::{Body, Bytes},
    http::header::{self, HeaderMap, HeaderName},
};

use crate::http::response::HOP_BY_HOP_HEADERS;
use crate::proxy::ProxyError;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID set by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Inbound `Host` header, if readable.
pub fn host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Copy of the inbound headers suitable for an outbound request.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    for name in HOP_BY_HOP_HEADERS.iter() {
        headers.remove(name);
    }
    headers
}

/// Read the whole request body, refusing anything over `limit` bytes.
pub async fn buffer_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ProxyError::PayloadTooLarge { limit })
}
