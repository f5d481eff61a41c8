//! Script-callback HTTP relay library.
//!
//! A browser script that cannot make a cross-origin request asks the relay
//! to make it instead. The relay performs the call and streams the result
//! back as callback statements that drive a client-side request object
//! through the usual milestones: headers received, loading, done.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod security;

pub use config::schema::RelayConfig;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
pub use relay::RelayEngine;
