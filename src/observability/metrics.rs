//! Metrics collection and exposition.
//!
//! # Metrics
//! - `messages_http_requests_total` (counter): requests by method, status
//! - `messages_http_request_duration_seconds` (histogram): latency distribution
//! - `messages_rate_limited_total` (counter): rejected writes by route limit name
//! - `messages_notifications_total` (counter): dispatch outcomes by status
//! - `messages_mail_retries_total` (counter): retried transport attempts
//! - `messages_circuit_transitions_total` (counter): breaker transitions by from/to
//! - `messages_circuit_state` (gauge): 0=closed, 1=open, 2=half-open

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "messages_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("messages_http_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    metrics::counter!("messages_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_notification(status: &'static str) {
    metrics::counter!("messages_notifications_total", "status" => status).increment(1);
}

pub fn record_retry(attempt: u32) {
    metrics::counter!("messages_mail_retries_total", "attempt" => attempt.to_string()).increment(1);
}

pub fn record_circuit_transition(from: &'static str, to: &'static str, state_value: f64) {
    metrics::counter!("messages_circuit_transitions_total", "from" => from, "to" => to)
        .increment(1);
    metrics::gauge!("messages_circuit_state").set(state_value);
}
