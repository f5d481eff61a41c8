//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Relay behaviour (endpoint path, access policy, forwarding policy).
    pub relay: RelaySettings,

    /// Outbound call deadlines.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Relay endpoint and outbound request policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Path the relay endpoint is mounted on.
    pub path: String,

    /// Agent string sent upstream in place of the client's `User-Agent`.
    pub user_agent: String,

    /// Regular expression the whole target URL must match. Unset allows every
    /// http/https URL.
    pub url_whitelist: Option<String>,

    /// Header names refused in addition to the built-in denylist.
    pub extra_denied_headers: Vec<String>,

    /// Require `data` and `dataType` to be supplied together.
    pub require_data_type: bool,

    /// Maximum redirects followed by the outbound call (0 disables).
    pub max_redirects: usize,

    /// Number of flushed statement batches buffered towards the client.
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            path: "/proxy.js".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            url_whitelist: None,
            extra_denied_headers: Vec::new(),
            require_data_type: false,
            max_redirects: 10,
            channel_capacity: 16,
        }
    }
}

/// Agent string identifying the relay to upstream servers.
pub const DEFAULT_USER_AGENT: &str = concat!("ajax-relay/", env!("CARGO_PKG_VERSION"));

/// Timeout configuration for the outbound call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: Option<u64>,

    /// Deadline for the whole outbound call, body included, in seconds.
    /// Unset leaves the call unbounded.
    pub request_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: Some(30),
            request_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
