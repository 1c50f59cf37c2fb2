//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external backend:
//!     → circuit_breaker.rs (admission: fail fast while the backend is down)
//!     → retries.rs (retry transient errors with backoff.rs delays)
//!     → circuit_breaker.rs (record the final outcome of the retry loop)
//! ```
//!
//! # Design Decisions
//! - Breakers are per backend, retries are per call
//! - One breaker outcome per retry loop, whatever the error class
//! - Backoff waits are cancellable; nothing else here blocks

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
};
pub use retries::{is_retryable, with_retry, RetryConfig, RetryError};
