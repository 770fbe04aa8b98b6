//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): denials by tier
//! - `gateway_gate_denials_total` (counter): denials by gate and reason
//! - `gateway_routes_mounted` (gauge): modules mounted at startup
//! - `gateway_rate_limit_records` (gauge): live window records by tier

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();
    counter!("gateway_requests_total", "status" => status).increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
    response
}

pub fn record_rate_limited(tier: &'static str) {
    counter!("gateway_rate_limited_total", "tier" => tier).increment(1);
}

pub fn record_gate_denial(gate: &'static str, reason: &'static str) {
    counter!("gateway_gate_denials_total", "gate" => gate, "reason" => reason).increment(1);
}

pub fn record_routes_mounted(count: usize) {
    gauge!("gateway_routes_mounted").set(count as f64);
}

pub fn record_limiter_size(tier: &'static str, records: usize) {
    gauge!("gateway_rate_limit_records", "tier" => tier).set(records as f64);
}
