//! Relay error taxonomy and its mapping onto in-band failure reports.
//!
//! # Design Decisions
//! - Transport problems (connect, DNS, TLS, timeout, reset, bad framing,
//!   corrupt compressed body) report 502 Bad Gateway
//! - Everything else, validation included, reports 501 Not implemented
//! - The diagnostic trace is the error's `source()` chain

use std::error::Error as StdError;

use thiserror::Error;

use crate::relay::validator::ValidationError;
use crate::security::HeaderError;

/// Errors that end a relay operation.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("could not prepare outbound headers")]
    Header(#[from] HeaderError),

    #[error("upstream request failed")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response body")]
    Decode(#[source] std::io::Error),
}

impl RelayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RelayError::Transport(_) | RelayError::Decode(_) => FailureKind::BadGateway,
            _ => FailureKind::NotImplemented,
        }
    }

    /// Short category name that leads the diagnostic text.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::Validation(ValidationError::AccessDenied(_)) | RelayError::Header(_) => {
                "UnexpectedError"
            }
            RelayError::Validation(_) => "ValidationError",
            RelayError::Transport(_) | RelayError::Decode(_) => "TransportError",
        }
    }
}

/// Status reported to the client for a failed relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    BadGateway,
    NotImplemented,
}

impl FailureKind {
    pub fn status(&self) -> u16 {
        match self {
            FailureKind::BadGateway => 502,
            FailureKind::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FailureKind::BadGateway => "Bad Gateway",
            FailureKind::NotImplemented => "Not implemented",
        }
    }
}

/// Everything the encoder needs to report a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub kind: FailureKind,
    pub category: String,
    pub message: String,
    pub trace: Vec<String>,
}

impl RelayFailure {
    pub fn from_error(err: &RelayError) -> Self {
        let mut trace = Vec::new();
        let mut cause = err.source();
        while let Some(e) = cause {
            trace.push(format!("caused by: {e}"));
            cause = e.source();
        }

        Self {
            kind: err.kind(),
            category: err.category().to_string(),
            message: err.to_string(),
            trace,
        }
    }
}

/// Errors building the relay from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid URL whitelist: {0}")]
    Whitelist(#[from] regex::Error),

    #[error("invalid user agent: {0}")]
    UserAgent(#[from] axum::http::header::InvalidHeaderValue),

    #[error("could not create outbound client: {0}")]
    Client(#[from] reqwest::Error),
}
