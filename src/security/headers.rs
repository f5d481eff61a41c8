//! Outbound header preparation.
//!
//! # Responsibilities
//! - Replace the client's User-Agent with the relay's own agent string
//! - Add X-Forwarded-For and X-Forwarded-User-Agent from the real client
//! - Request compressed transfer (the relay decodes it itself)
//! - Strip client headers on the denylist
//!
//! # Design Decisions
//! - Never trust X-Forwarded-* or connection headers from the client
//! - Names are compared trimmed and lowercased; forwarded names use that form
//! - Repeated client headers are appended, never merged or deduplicated

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use thiserror::Error;

/// Client header names the relay never forwards verbatim.
pub const DENIED_HEADERS: &[&str] = &[
    "accept-charset",
    "accept-encoding",
    "connection",
    "content-length",
    "cookie",
    "cookie2",
    "content-transfer-encoding",
    "date",
    "expect",
    "host",
    "keep-alive",
    "referer",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "via",
    "x-forwarded-for",
    "x-forwarded-user-agent",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_USER_AGENT: &str = "x-forwarded-user-agent";
const ACCEPT_ENCODING_VALUE: &str = "gzip, deflate";

/// A client-supplied header that cannot be expressed on the wire.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid header name {0:?}")]
    InvalidName(String),

    #[error("invalid value for header {0:?}")]
    InvalidValue(String),
}

/// Who the relay is acting for.
#[derive(Debug, Clone, Default)]
pub struct ClientIdentity {
    pub address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Immutable forwarding rules shared by every relay operation.
#[derive(Debug, Clone)]
pub struct ForwardingPolicy {
    user_agent: HeaderValue,
    denied: HashSet<String>,
}

impl ForwardingPolicy {
    /// Build a policy from the agent string and any extra denied names.
    pub fn new(user_agent: &str, extra_denied: &[String]) -> Result<Self, InvalidHeaderValue> {
        let denied = DENIED_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(extra_denied.iter().map(|h| normalize_name(h)))
            .collect();

        Ok(Self {
            user_agent: HeaderValue::from_str(user_agent)?,
            denied,
        })
    }

    /// Returns true if a client header with this name must be dropped.
    pub fn is_denied(&self, name: &str) -> bool {
        self.denied.contains(&normalize_name(name))
    }

    /// Assemble the complete outbound header map.
    ///
    /// `content_type` is the declared body type and replaces any
    /// `Content-Type` the client also listed.
    pub fn outbound_headers(
        &self,
        client: &ClientIdentity,
        client_headers: &[(String, String)],
        content_type: Option<&str>,
    ) -> Result<HeaderMap, HeaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, self.user_agent.clone());

        if let Some(addr) = client.address {
            headers.insert(
                HeaderName::from_static(X_FORWARDED_FOR),
                header_value(X_FORWARDED_FOR, &addr.to_string())?,
            );
        }
        if let Some(agent) = &client.user_agent {
            headers.insert(
                HeaderName::from_static(X_FORWARDED_USER_AGENT),
                header_value(X_FORWARDED_USER_AGENT, agent)?,
            );
        }
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static(ACCEPT_ENCODING_VALUE),
        );

        for (name, value) in client_headers {
            let name = normalize_name(name);
            if self.denied.contains(&name) {
                tracing::debug!(header = %name, "Dropping denied client header");
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HeaderError::InvalidName(name.clone()))?;
            headers.append(header_name, header_value(&name, value)?);
        }

        if let Some(content_type) = content_type {
            headers.insert(header::CONTENT_TYPE, header_value("content-type", content_type)?);
        }

        Ok(headers)
    }
}

/// Header value as text, reading non-ASCII bytes as ISO-8859-1.
pub fn header_text(value: &HeaderValue) -> String {
    value.as_bytes().iter().map(|&b| char::from(b)).collect()
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, HeaderError> {
    HeaderValue::from_bytes(value.as_bytes()).map_err(|_| HeaderError::InvalidValue(name.to_string()))
}
