//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relay operations by outcome, status
//! - `relay_request_duration_seconds` (histogram): validation to DONE
//! - `relay_body_bytes_total` (counter): upstream body bytes before decoding

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_relay(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "relay_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_body_bytes(bytes: u64) {
    counter!("relay_body_bytes_total").increment(bytes);
}
