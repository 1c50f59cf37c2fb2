//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the search
//! client. All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::{CircuitBreakerConfig, RetryConfig};

/// Root configuration for the search client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Primary search backend.
    pub engine: Engine,

    /// Serper API key. Serper calls fail with a configuration error when empty.
    pub serper_api_key: String,

    /// Base URL of a SearXNG instance.
    pub searxng_url: String,

    /// Domains every search is restricted to, merged with per-request lists.
    pub domain_filters: Vec<String>,

    /// Location preference applied when a request carries none.
    pub location_hint: Option<String>,

    /// Refuse all outbound calls unless a request overrides it.
    pub offline_mode: bool,

    /// Per-backend circuit breaker settings.
    pub circuit_breaker: BreakerSettings,

    /// HTTP client settings.
    pub http: HttpConfig,

    /// Retry settings for backend calls.
    pub retry: RetrySettings,

    /// Backend endpoints.
    pub endpoints: EndpointConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl SearchConfig {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            enabled: self.circuit_breaker.enabled,
            failure_threshold: self.circuit_breaker.failure_threshold,
            success_threshold: self.circuit_breaker.success_threshold,
            timeout: Duration::from_secs(self.circuit_breaker.timeout_secs),
            max_half_open_calls: self.circuit_breaker.max_half_open_calls,
        }
    }

    /// Retry policy for the primary backends.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            ..RetryConfig::default()
        }
    }
}

/// Search backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Serper,
    Searxng,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Serper => "serper",
            Engine::Searxng => "searxng",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serper" => Ok(Engine::Serper),
            "searxng" => Ok(Engine::Searxng),
            other => Err(format!("unknown search engine '{}'", other)),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Enable circuit breakers.
    pub enabled: bool,

    /// Consecutive failures before opening.
    pub failure_threshold: u32,

    /// Half-open successes before closing.
    pub success_threshold: u32,

    /// Seconds to stay open before probing.
    pub timeout_secs: u64,

    /// Probe calls admitted while half-open.
    pub max_half_open_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 15,
            success_threshold: 5,
            timeout_secs: 45,
            max_half_open_calls: 10,
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Search request timeout in seconds.
    pub timeout_secs: u64,

    /// Serper scrape timeout in seconds.
    pub scrape_timeout_secs: u64,

    /// Direct fetch fallback timeout in seconds.
    pub fallback_timeout_secs: u64,

    /// Connections kept per backend host.
    pub max_conns_per_host: usize,

    /// Idle connections kept overall.
    pub max_idle_conns: usize,

    /// Idle connection lifetime in seconds.
    pub idle_conn_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            scrape_timeout_secs: 30,
            fallback_timeout_secs: 10,
            max_conns_per_host: 50,
            max_idle_conns: 100,
            idle_conn_timeout_secs: 90,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 250,
            max_delay_ms: 5000,
            backoff_factor: 1.5,
        }
    }
}

/// Backend endpoint URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub serper_search: String,
    pub serper_scrape: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            serper_search: "https://google.serper.dev/search".to_string(),
            serper_scrape: "https://scrape.serper.dev".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "console" | "text" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Console,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.engine, Engine::Serper);
        assert!(!config.offline_mode);
        assert!(config.circuit_breaker.enabled);
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.endpoints.serper_scrape, "https://scrape.serper.dev");

        let breaker = config.breaker_config();
        assert_eq!(breaker.failure_threshold, 15);
        assert_eq!(breaker.timeout, Duration::from_secs(45));

        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(5));
        assert!(retry.retryable_errors.iter().any(|p| p == "503"));
    }

    #[test]
    fn test_partial_toml() {
        let config: SearchConfig = toml::from_str(
            r#"
            engine = "searxng"
            searxng_url = "http://searx.local:8080"
            domain_filters = ["example.com"]

            [circuit_breaker]
            failure_threshold = 3

            [retry]
            max_delay_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.engine, Engine::Searxng);
        assert_eq!(config.domain_filters, vec!["example.com".to_string()]);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.success_threshold, 5);
        assert_eq!(config.retry.max_delay_ms, 1000);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!("SearXNG".parse::<Engine>(), Ok(Engine::Searxng));
        assert_eq!(" serper ".parse::<Engine>(), Ok(Engine::Serper));
        assert!("bing".parse::<Engine>().is_err());
        assert_eq!(Engine::Searxng.to_string(), "searxng");
    }
}
