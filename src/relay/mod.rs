//! Relay subsystem: one inbound description in, one outbound call, a stream
//! of callback statements out.
//!
//! # Data Flow
//! ```text
//! RequestCandidate (from http::params)
//!     → validator.rs (URL, access policy, method, body rules)
//!     → engine.rs (outbound call, status/headers, body loop)
//!         → decode.rs (content coding, then charset)
//!         → event.rs (ResponseEvent per milestone)
//!     → writer.rs (encoder.rs turns events into statements, flushed per milestone)
//!     → streaming response body
//! ```
//!
//! # Design Decisions
//! - Every failure is reported in-band; the stream always ends with DONE
//! - One shared outbound client that keeps no idle connections and never retries
//! - Decoding pipeline chosen once per response

pub mod decode;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod event;
pub mod validator;
pub mod writer;

pub use encoder::{escape_js_string, ScriptEncoder};
pub use engine::{ClientOptions, RelayEngine, RelayOutcome};
pub use error::{FailureKind, RelayError, RelayFailure, SetupError};
pub use event::ResponseEvent;
pub use validator::{RelayMethod, RelayRequest, RequestCandidate, RequestValidator, ValidationError};
pub use writer::ScriptWriter;
