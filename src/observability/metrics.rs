//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): dispatched exchanges by method, status, route
//! - `router_request_duration_seconds` (histogram): time from receipt to flush
//! - `router_handler_failures_total` (counter): handler errors and panics by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter the calls are no-ops
//! - Unmatched exchanges are labelled `route="none"` to keep cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed exchange.
pub fn record_request(method: &str, status: u16, route: Option<&str>, start: Instant) {
    let route = route.unwrap_or("none").to_string();
    let status = status.to_string();

    counter!(
        "router_requests_total",
        "method" => method.to_string(),
        "status" => status.clone(),
        "route" => route.clone()
    )
    .increment(1);

    histogram!(
        "router_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a handler that failed instead of producing a response.
pub fn record_handler_failure(method: &str, route: &str) {
    counter!(
        "router_handler_failures_total",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
}
