//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): HTTP requests by method, status
//! - `relay_request_duration_seconds` (histogram): end-to-end latency
//! - `relay_bridge_events_total` (counter): bridge lifecycle events
//!   (`connected`, `login_rejected`, `peer_closed`, `io_error`, `closed`)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    metrics::counter!(
        "relay_requests_total",
        "method" => method.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "relay_request_duration_seconds",
        "method" => method,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a bridge lifecycle event.
pub fn record_bridge_event(event: &'static str) {
    metrics::counter!("relay_bridge_events_total", "event" => event).increment(1);
}
