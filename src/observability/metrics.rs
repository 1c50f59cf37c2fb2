//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define search provider metrics (requests, latency, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `search_provider_requests_total` (counter): calls by operation, provider, status
//! - `search_provider_latency_seconds` (histogram): backend call latency
//! - `search_circuit_breaker_state` (gauge): 0=closed, 0.5=half-open, 1=open
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels for operation, provider and outcome only; never query text

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::CircuitState;

pub const REQUESTS_TOTAL: &str = "search_provider_requests_total";
pub const LATENCY_SECONDS: &str = "search_provider_latency_seconds";
pub const BREAKER_STATE: &str = "search_circuit_breaker_state";

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

/// Count one backend call.
pub fn record_provider_request(operation: &str, provider: &str, status: &str) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the latency of one backend call started at `start`.
pub fn record_provider_latency(provider: &str, start: Instant) {
    metrics::histogram!(LATENCY_SECONDS, "provider" => provider.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_state(provider: &str, state: CircuitState) {
    metrics::gauge!(BREAKER_STATE, "provider" => provider.to_string()).set(state.gauge_value());
}
