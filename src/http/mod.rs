//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing)
//!     → params.rs (query string → object name + RequestCandidate)
//!     → relay engine (spawned task, writes statements)
//!     → response.rs (streaming text/javascript body)
//!     → Send to client
//! ```

pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use params::{ParamsError, RelayParams};
pub use request::X_REQUEST_ID;
pub use server::RelayServer;
