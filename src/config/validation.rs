//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, backoff never shrinks)
//! - Check URLs parse before any request is built from them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SearchConfig → Result<(), Vec<ValidationError>>
//! - A missing API key is not an error here; the client reports it per call

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::SearchConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &SearchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.searxng_url.trim().is_empty() {
        if let Err(e) = Url::parse(config.searxng_url.trim()) {
            errors.push(ValidationError::new(
                "searxng_url",
                format!("invalid URL '{}': {}", config.searxng_url, e),
            ));
        }
    }
    for (field, value) in [
        ("endpoints.serper_search", &config.endpoints.serper_search),
        ("endpoints.serper_scrape", &config.endpoints.serper_scrape),
    ] {
        if let Err(e) = Url::parse(value) {
            errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
        }
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be greater than 0"));
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be greater than 0"));
    }
    if cb.max_half_open_calls == 0 {
        errors.push(ValidationError::new("circuit_breaker.max_half_open_calls", "must be greater than 0"));
    }
    // Half-Open admits the transitioning call plus max_half_open_calls more.
    if cb.success_threshold > cb.max_half_open_calls.saturating_add(1) {
        errors.push(ValidationError::new(
            "circuit_breaker.success_threshold",
            format!(
                "{} can never be reached with max_half_open_calls {}",
                cb.success_threshold, cb.max_half_open_calls
            ),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be greater than 0"));
    }
    if !(retry.backoff_factor >= 1.0) {
        errors.push(ValidationError::new(
            "retry.backoff_factor",
            format!("must be at least 1.0, got {}", retry.backoff_factor),
        ));
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        errors.push(ValidationError::new(
            "retry.max_delay_ms",
            format!(
                "must not be below initial_delay_ms ({} < {})",
                retry.max_delay_ms, retry.initial_delay_ms
            ),
        ));
    }

    let http = &config.http;
    for (field, secs) in [
        ("http.timeout_secs", http.timeout_secs),
        ("http.scrape_timeout_secs", http.scrape_timeout_secs),
        ("http.fallback_timeout_secs", http.fallback_timeout_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
