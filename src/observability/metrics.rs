//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Path is not a label (unbounded cardinality with path params)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

#[derive(Debug, thiserror::Error)]
#[error("Failed to install metrics exporter on {address}: {message}")]
pub struct MetricsError {
    pub address: SocketAddr,
    pub message: String,
}

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(address: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| MetricsError {
            address,
            message: e.to_string(),
        })?;

    tracing::info!(address = %address, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
