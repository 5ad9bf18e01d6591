//! Failure modes of the proxy request path.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::text_response;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid target URL '{0}'")]
    InvalidUrl(String),

    #[error("target '{0}' is not whitelisted")]
    Forbidden(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(#[from] reqwest::Error),

    #[error("upstream sent no response within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream redirected to unusable location '{0}'")]
    InvalidRedirect(String),

    #[error("redirect chain exceeded {0} hops")]
    TooManyRedirects(usize),

    #[error("no response produced within {0:?}")]
    RequestTimeout(Duration),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamUnreachable(_)
            | ProxyError::UpstreamTimeout(_)
            | ProxyError::InvalidRedirect(_)
            | ProxyError::TooManyRedirects(_)
            | ProxyError::RequestTimeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shown to clients; never includes internal detail.
    pub fn public_message(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "Invalid URL",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::PAYLOAD_TOO_LARGE => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        text_response(self.status(), self.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::InvalidUrl("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::TooManyRedirects(10).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::UpstreamTimeout(Duration::from_secs(1)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::RequestTimeout(Duration::from_secs(1)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_hides_detail() {
        let response = ProxyError::InvalidRedirect("http://[::1".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
