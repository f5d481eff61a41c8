//! Inbound request metadata.
//!
//! # Responsibilities
//! - Request ID generation and propagation (`x-request-id`, UUID v4)
//! - Extract who the relay acts for: peer address and User-Agent
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied request ID is kept rather than replaced

use std::net::SocketAddr;

use axum::http::header::{HeaderMap, USER_AGENT};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::security::{header_text, ClientIdentity};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning a request ID to requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// The request ID set by [`set_request_id_layer`], or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Identity forwarded upstream in the X-Forwarded-* headers.
pub fn client_identity(peer: SocketAddr, headers: &HeaderMap) -> ClientIdentity {
    ClientIdentity {
        address: Some(peer.ip()),
        user_agent: headers.get(USER_AGENT).map(header_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }

    #[test]
    fn test_client_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0 (X11)"));
        let identity = client_identity("198.51.100.4:51234".parse().unwrap(), &headers);
        assert_eq!(identity.address, Some("198.51.100.4".parse().unwrap()));
        assert_eq!(identity.user_agent.as_deref(), Some("Mozilla/5.0 (X11)"));

        let identity = client_identity("[::1]:80".parse().unwrap(), &HeaderMap::new());
        assert!(identity.user_agent.is_none());
    }
}
