//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience/ and search/ produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, console or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder every update is a no-op, so library code records freely

pub mod logging;
pub mod metrics;
