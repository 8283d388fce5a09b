//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): REST requests by RPC method, status
//! - `gateway_request_duration_seconds` (histogram): REST latency
//! - `rpc_calls_total` (counter): RPC calls by method, code
//! - `rpc_call_duration_seconds` (histogram): RPC handler latency
//!
//! # Design Decisions
//! - Recording is always on and cheap; without an installed exporter the
//!   `metrics` macros are no-ops
//! - Labels are low-cardinality: method names and status codes only

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tonic::Code;

use crate::translate::code_name;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one gateway request.
pub fn record_request(rpc_method: &str, status: u16, start: Instant) {
    let rpc_method = rpc_method.to_string();
    let status = status.to_string();
    metrics::counter!(
        "gateway_requests_total",
        "rpc_method" => rpc_method.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "rpc_method" => rpc_method,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one RPC call served by the RPC server.
pub fn record_rpc_call(method: &'static str, code: Code, start: Instant) {
    let code = code_name(code);
    metrics::counter!("rpc_calls_total", "method" => method, "code" => code).increment(1);
    metrics::histogram!("rpc_call_duration_seconds", "method" => method, "code" => code)
        .record(start.elapsed().as_secs_f64());
}
