//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_round_trips_total` (counter): round trips by outcome and status
//! - `relay_round_trip_duration_seconds` (histogram): time to response headers
//! - `relay_bytes_relayed_total` (counter): response body bytes copied to clients
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed round trip. `status` is `None` when the transport failed.
pub fn record_round_trip(status: Option<u16>, elapsed: Duration) {
    let (outcome, status) = match status {
        Some(code) => ("success", code.to_string()),
        None => ("error", "none".to_string()),
    };
    metrics::counter!("relay_round_trips_total", "outcome" => outcome, "status" => status)
        .increment(1);
    metrics::histogram!("relay_round_trip_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record response bytes copied to the client.
pub fn record_bytes_relayed(bytes: u64) {
    metrics::counter!("relay_bytes_relayed_total").increment(bytes);
}
