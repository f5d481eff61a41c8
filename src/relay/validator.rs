//! Inbound request validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! URL syntax and scheme, access policy, method, GET/HEAD body rule,
//! then (optionally) the body/content-type pairing. Nothing here touches
//! the network.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::security::{ClientIdentity, UrlPolicy};

/// Methods the relay is willing to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl RelayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMethod::Get => "GET",
            RelayMethod::Post => "POST",
            RelayMethod::Put => "PUT",
            RelayMethod::Delete => "DELETE",
            RelayMethod::Head => "HEAD",
            RelayMethod::Options => "OPTIONS",
        }
    }

    /// GET and HEAD never carry a request body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, RelayMethod::Get | RelayMethod::Head)
    }

    pub fn to_http(self) -> Method {
        match self {
            RelayMethod::Get => Method::GET,
            RelayMethod::Post => Method::POST,
            RelayMethod::Put => Method::PUT,
            RelayMethod::Delete => Method::DELETE,
            RelayMethod::Head => Method::HEAD,
            RelayMethod::Options => Method::OPTIONS,
        }
    }
}

impl FromStr for RelayMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RelayMethod::Get),
            "POST" => Ok(RelayMethod::Post),
            "PUT" => Ok(RelayMethod::Put),
            "DELETE" => Ok(RelayMethod::Delete),
            "HEAD" => Ok(RelayMethod::Head),
            "OPTIONS" => Ok(RelayMethod::Options),
            _ => Err(ValidationError::InvalidMethod(s.to_string())),
        }
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an inbound description was refused.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("URL missing")]
    MissingUrl,

    #[error("invalid URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid protocol {0:?}, only http and https are supported")]
    UnsupportedScheme(String),

    #[error("URL access not allowed: {0}")]
    AccessDenied(String),

    #[error("method missing")]
    MissingMethod,

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("cannot send data with {0}")]
    BodyNotAllowed(RelayMethod),

    #[error("data given without a data type")]
    BodyWithoutContentType,

    #[error("data type given without data")]
    ContentTypeWithoutBody,
}

/// Raw, unchecked description of the request the client wants performed.
#[derive(Debug, Clone, Default)]
pub struct RequestCandidate {
    pub url: Option<String>,
    pub method: Option<String>,
    pub body: Option<String>,
    pub content_type: Option<String>,
    /// Additional headers in the order the client listed them.
    pub headers: Vec<(String, String)>,
    pub client: ClientIdentity,
}

/// A request that passed validation and may be sent upstream.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub url: Url,
    pub method: RelayMethod,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub client: ClientIdentity,
}

/// Pure validation step in front of the relay engine.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    policy: UrlPolicy,
    require_content_type: bool,
}

impl RequestValidator {
    pub fn new(policy: UrlPolicy, require_content_type: bool) -> Self {
        Self {
            policy,
            require_content_type,
        }
    }

    /// Access policy applied to the target URL.
    pub fn policy(&self) -> &UrlPolicy {
        &self.policy
    }

    pub fn validate(&self, candidate: RequestCandidate) -> Result<RelayRequest, ValidationError> {
        let raw_url = candidate.url.ok_or(ValidationError::MissingUrl)?;
        let url = Url::parse(&raw_url).map_err(|source| ValidationError::InvalidUrl {
            url: raw_url.clone(),
            source,
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ValidationError::UnsupportedScheme(url.scheme().to_string()));
        }

        if !self.policy.allows(&raw_url) {
            return Err(ValidationError::AccessDenied(raw_url));
        }

        let method: RelayMethod = candidate
            .method
            .as_deref()
            .ok_or(ValidationError::MissingMethod)?
            .parse()?;

        if candidate.body.is_some() && !method.allows_body() {
            return Err(ValidationError::BodyNotAllowed(method));
        }

        let content_type = if self.require_content_type {
            match (&candidate.body, &candidate.content_type) {
                (Some(_), None) => return Err(ValidationError::BodyWithoutContentType),
                (None, Some(_)) => return Err(ValidationError::ContentTypeWithoutBody),
                _ => candidate.content_type,
            }
        } else {
            // A declared type only means something alongside a body.
            candidate.content_type.filter(|_| candidate.body.is_some())
        };

        Ok(RelayRequest {
            url,
            method,
            body: candidate.body,
            content_type,
            headers: candidate.headers,
            client: candidate.client,
        })
    }
}
