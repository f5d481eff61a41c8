//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Validated relay request:
//!     → access_control.rs (target URL must satisfy the whitelist)
//!     → headers.rs (drop denied client headers, add X-Forwarded-*)
//!     → Pass to the relay engine
//! ```
//!
//! # Design Decisions
//! - Both policies are built once at startup and never mutated
//! - No trust in client input: identity and connection headers are always
//!   set by the relay itself

pub mod access_control;
pub mod headers;

pub use access_control::UrlPolicy;
pub use headers::{header_text, ClientIdentity, ForwardingPolicy, HeaderError};
