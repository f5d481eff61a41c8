//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (relay counters and latency histogram)
//!
//! Consumers:
//!     → stdout (human-readable or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to the relay span, so every event of one relay
//!   operation carries it
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
