//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, the endpoint path and the whitelist pattern
//! - Validate value ranges (timeouts > 0, channel capacity > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("relay.path must start with '/', got {0:?}")]
    InvalidPath(String),

    #[error("relay.url_whitelist is not a valid pattern: {0}")]
    InvalidWhitelist(String),

    #[error("relay.user_agent is not a valid header value")]
    InvalidUserAgent,

    #[error("relay.extra_denied_headers contains an empty name")]
    EmptyDeniedHeader,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let relay = &config.relay;
    if !relay.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(relay.path.clone()));
    }

    if let Some(pattern) = &relay.url_whitelist {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(ValidationError::InvalidWhitelist(e.to_string()));
        }
    }

    if HeaderValue::from_str(&relay.user_agent).is_err() {
        errors.push(ValidationError::InvalidUserAgent);
    }

    if relay.extra_denied_headers.iter().any(|h| h.trim().is_empty()) {
        errors.push(ValidationError::EmptyDeniedHeader);
    }

    if relay.channel_capacity == 0 {
        errors.push(ValidationError::Zero("relay.channel_capacity"));
    }

    if config.timeouts.connect_secs == Some(0) {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }

    if config.timeouts.request_secs == Some(0) {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
