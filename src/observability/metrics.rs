//! Metrics collection and exposition.
//!
//! # Metrics
//! - `session_requests_total` (counter): requests by outcome
//! - `session_refresh_total` (counter): refresh cycles by outcome
//! - `session_requests_replayed_total` (counter): requests resumed after a refresh
//! - `session_refresh_queue_depth` (gauge): waiters behind the in-flight refresh
//! - `session_refresh_duration_seconds` (histogram): refresh call latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Exporter is opt-in; a client library should not open ports by default

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    metrics::counter!("session_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
    metrics::histogram!("session_refresh_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_replayed() {
    metrics::counter!("session_requests_replayed_total").increment(1);
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!("session_refresh_queue_depth").set(depth as f64);
}
