//! Circuit breaker for outbound backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: on the first admission check after `timeout`
//! Half-Open → Closed: successes >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - One breaker per backend, created once and only ever reset
//! - Fail fast in Open state
//! - Bounded probe budget in Half-Open (`max_half_open_calls`)
//! - Admission takes the write lock because it may move Open → Half-Open

use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;
use thiserror::Error;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value exported for the state (0 closed, 0.5 half-open, 1 open).
    pub fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 0.5,
            CircuitState::Open => 1.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Failures in Closed before opening.
    pub failure_threshold: u32,
    /// Successes in Half-Open before closing.
    pub success_threshold: u32,
    /// How long to stay Open before probing.
    pub timeout: Duration,
    /// Probe budget while Half-Open.
    pub max_half_open_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 15,
            success_threshold: 5,
            timeout: Duration::from_secs(45),
            max_half_open_calls: 10,
        }
    }
}

/// Point-in-time view of a breaker, for status output and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure_time: Option<SystemTime>,
    pub half_open_calls: u32,
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker refused the call; the operation was not run.
    #[error("circuit breaker is open for {operation}")]
    Open { operation: String },

    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    last_failure_time: Option<SystemTime>,
    half_open_calls: u32,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            last_failure: None,
            last_failure_time: None,
            half_open_calls: 0,
        }
    }

    fn transition_to(&mut self, next: CircuitState) {
        self.state = next;
        self.failures = 0;
        self.successes = 0;
        self.half_open_calls = 0;
    }
}

/// Per-backend circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(BreakerState::closed()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under breaker protection.
    ///
    /// A refused call returns [`BreakerError::Open`] without awaiting `f`.
    /// Otherwise the outcome is recorded and the error is passed through.
    /// Dropping the returned future after admission records a failure, so
    /// an abandoned call never keeps its Half-Open slot.
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            return Err(BreakerError::Open {
                operation: operation.to_string(),
            });
        }

        let guard = AdmittedCall {
            breaker: self,
            operation,
            pending: true,
        };
        let result = f().await;
        guard.finish(result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    /// Decide whether a call may proceed.
    ///
    /// Not a pure read: once the Open timeout has elapsed this moves the
    /// breaker to Half-Open, and every Half-Open admission consumes probe
    /// budget.
    pub fn allow_request(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut inner = self.write();
        let current = inner.state;
        match current {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!(breaker = %self.name, "circuit breaker transitioning to half-open");
                    inner.transition_to(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_calls < self.config.max_half_open_calls {
                    inner.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Feed the outcome of one backend call into the state machine.
    pub fn record_result(&self, operation: &str, success: bool) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.write();
        if success {
            inner.successes += 1;
            let current = inner.state;
            match current {
                CircuitState::HalfOpen if inner.successes >= self.config.success_threshold => {
                    tracing::info!(
                        breaker = %self.name,
                        operation = operation,
                        successes = inner.successes,
                        "circuit breaker closing from half-open"
                    );
                    inner.transition_to(CircuitState::Closed);
                }
                CircuitState::Closed => {
                    inner.failures = 0;
                    inner.successes = 0;
                }
                _ => {}
            }
            return;
        }

        inner.failures += 1;
        inner.successes = 0;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(SystemTime::now());

        let current = inner.state;
        match current {
            CircuitState::HalfOpen => {
                tracing::warn!(
                    breaker = %self.name,
                    operation = operation,
                    "circuit breaker opening from half-open due to failure"
                );
                inner.transition_to(CircuitState::Open);
            }
            CircuitState::Closed if inner.failures >= self.config.failure_threshold => {
                tracing::warn!(
                    breaker = %self.name,
                    operation = operation,
                    failures = inner.failures,
                    "circuit breaker opening due to failure threshold"
                );
                inner.transition_to(CircuitState::Open);
            }
            _ => {}
        }
    }

    /// Current state. Always Closed when the breaker is disabled.
    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        self.read().state
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.read();
        CircuitBreakerMetrics {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
            last_failure_time: inner.last_failure_time,
            half_open_calls: inner.half_open_calls,
        }
    }

    /// Force the breaker back to Closed with zeroed counters.
    pub fn reset(&self) {
        if !self.config.enabled {
            return;
        }

        tracing::info!(breaker = %self.name, "manually resetting circuit breaker");
        self.write().transition_to(CircuitState::Closed);
    }

    fn read(&self) -> RwLockReadGuard<'_, BreakerState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BreakerState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admitted call whose outcome has not been recorded yet.
struct AdmittedCall<'a> {
    breaker: &'a CircuitBreaker,
    operation: &'a str,
    pending: bool,
}

impl AdmittedCall<'_> {
    fn finish(mut self, success: bool) {
        self.pending = false;
        self.breaker.record_result(self.operation, success);
    }
}

impl Drop for AdmittedCall<'_> {
    fn drop(&mut self) {
        if self.pending {
            tracing::debug!(
                breaker = %self.breaker.name,
                operation = self.operation,
                "admitted call dropped before completion"
            );
            self.breaker.record_result(self.operation, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: 3,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            max_half_open_calls: 3,
        }
    }

    fn trip(cb: &CircuitBreaker) {
        for _ in 0..cb.config().failure_threshold {
            cb.record_result("test", false);
        }
    }

    #[test]
    fn test_initial_state_is_closed() {
        let cb = CircuitBreaker::new("test", config());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_failures_below_threshold_stay_closed() {
        let cb = CircuitBreaker::new("test", config());
        cb.record_result("test", false);
        cb.record_result("test", false);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().failures, 2);
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = CircuitBreaker::new("test", config());
        trip(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());

        let metrics = cb.metrics();
        assert_eq!(metrics.failures, 0);
        assert!(metrics.last_failure_time.is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("test", config());
        cb.record_result("test", false);
        cb.record_result("test", false);
        cb.record_result("test", true);
        cb.record_result("test", false);
        cb.record_result("test", false);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().successes, 0);
    }

    #[test]
    fn test_stays_open_before_timeout() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::from_millis(200),
                ..config()
            },
        );
        trip(&cb);
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cb.allow_request());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::from_millis(30),
                ..config()
            },
        );
        trip(&cb);
        std::thread::sleep(Duration::from_millis(50));

        // state() alone never performs the transition.
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.metrics().half_open_calls, 0);
    }

    #[test]
    fn test_half_open_recovers_to_closed() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::ZERO,
                ..config()
            },
        );
        trip(&cb);
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_result("probe", true);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_result("probe", true);
        assert_eq!(cb.state(), CircuitState::Closed);

        let metrics = cb.metrics();
        assert_eq!(metrics.failures, 0);
        assert_eq!(metrics.successes, 0);
        assert_eq!(metrics.half_open_calls, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::ZERO,
                ..config()
            },
        );
        trip(&cb);
        assert!(cb.allow_request());
        cb.record_result("probe", true);
        cb.record_result("probe", false);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.metrics().half_open_calls, 0);
    }

    #[test]
    fn test_half_open_probe_cap() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::ZERO,
                max_half_open_calls: 2,
                ..config()
            },
        );
        trip(&cb);

        // The transitioning call is granted without consuming budget.
        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(!cb.allow_request());
        assert_eq!(cb.metrics().half_open_calls, 2);
    }

    #[test]
    fn test_success_threshold_reachable_within_half_open_budget() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::ZERO,
                success_threshold: 3,
                max_half_open_calls: 2,
                ..config()
            },
        );
        trip(&cb);

        for _ in 0..3 {
            assert!(cb.allow_request());
            cb.record_result("probe", true);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_reset() {
        let cb = CircuitBreaker::new("test", config());
        trip(&cb);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        assert_eq!(cb.metrics().failures, 0);
    }

    #[test]
    fn test_disabled_breaker_admits_everything() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                enabled: false,
                ..config()
            },
        );
        for _ in 0..10 {
            cb.record_result("test", false);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        assert_eq!(cb.metrics().failures, 0);
    }

    #[tokio::test]
    async fn test_execute_skips_call_when_open() {
        let cb = CircuitBreaker::new("test", config());
        trip(&cb);

        let calls = AtomicU32::new(0);
        let result: Result<(), BreakerError<String>> = cb
            .execute("search", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_open());
        assert_eq!(err.to_string(), "circuit breaker is open for search");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_records_outcome_and_passes_error_through() {
        let cb = CircuitBreaker::new("test", config());

        for _ in 0..3 {
            let result: Result<(), BreakerError<String>> = cb
                .execute("search", || async { Err("boom".to_string()) })
                .await;
            match result {
                Err(BreakerError::Inner(msg)) => assert_eq!(msg, "boom"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_dropped_half_open_calls_release_budget() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                timeout: Duration::ZERO,
                max_half_open_calls: 2,
                ..config()
            },
        );
        trip(&cb);

        for _ in 0..3 {
            let abandoned = tokio::time::timeout(
                Duration::from_millis(1),
                cb.execute("search", || std::future::pending::<Result<(), String>>()),
            )
            .await;
            assert!(abandoned.is_err());
            assert_eq!(cb.state(), CircuitState::Open);
        }

        let result: Result<u32, BreakerError<String>> =
            cb.execute("search", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_call_counts_as_failure() {
        let cb = CircuitBreaker::new("test", config());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(1),
            cb.execute("search", || std::future::pending::<Result<(), String>>()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cb.metrics().failures, 1);
    }

    #[test]
    fn test_concurrent_probes_respect_cap() {
        let cb = Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::ZERO,
                max_half_open_calls: 5,
                ..config()
            },
        ));
        trip(&cb);
        assert!(cb.allow_request());

        let granted = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let granted = Arc::clone(&granted);
                std::thread::spawn(move || {
                    if cb.allow_request() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
        assert_eq!(CircuitState::HalfOpen.gauge_value(), 0.5);
    }
}
