//! Metrics collection and exposition.
//!
//! # Metrics
//! - `backend_client_connections_total` (counter): connection attempts by service, outcome
//! - `backend_client_connect_duration_seconds` (histogram): TCP connect latency by service
//! - `backend_client_requests_total` (counter): outbound calls by service, method, status
//! - `backend_client_request_duration_seconds` (histogram): outbound latency by service, method
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_rejected_total` (counter): calls refused without a network attempt
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("backend_client_connections_total", "Backend connection attempts");
    describe_histogram!(
        "backend_client_connect_duration_seconds",
        "Backend TCP connect latency"
    );
    describe_counter!("backend_client_requests_total", "Outbound backend calls");
    describe_histogram!(
        "backend_client_request_duration_seconds",
        "Outbound backend call latency"
    );
    describe_gauge!("circuit_breaker_state", "0=closed, 1=open, 2=half-open");
    describe_counter!("circuit_breaker_rejected_total", "Calls rejected by an open breaker");
}

pub fn record_connection(service: &str, outcome: &'static str, start: Instant) {
    counter!(
        "backend_client_connections_total",
        "service" => service.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("backend_client_connect_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_request(service: &str, method: &str, status: &str, start: Instant) {
    counter!(
        "backend_client_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "backend_client_request_duration_seconds",
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_breaker_state(name: &str, state: f64) {
    gauge!("circuit_breaker_state", "name" => name.to_string()).set(state);
}

pub fn record_breaker_rejection(name: &str) {
    counter!("circuit_breaker_rejected_total", "name" => name.to_string()).increment(1);
}
