//! Configuration loading from disk and the environment.
//!
//! Precedence: defaults, then the TOML file (if any), then environment
//! variables. Validation runs once on the merged result.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::SearchConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SearchConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load configuration from an optional file overlaid with the process
/// environment.
pub fn load(path: Option<&Path>) -> Result<SearchConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

/// Like [`load`], reading variables through `lookup`.
pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<SearchConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => SearchConfig::default(),
    };
    apply_env(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<SearchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// Blank values are ignored, as are zero numeric values.
pub fn apply_env<F>(config: &mut SearchConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(engine) = env.parsed("MCP_SEARCH_ENGINE")? {
        config.engine = engine;
    }
    if let Some(key) = env.string("SERPER_API_KEY") {
        config.serper_api_key = key;
    }
    if let Some(url) = env.string("SEARXNG_URL") {
        config.searxng_url = url;
    }
    if let Some(domains) = env.string("SERPER_DOMAIN_FILTER") {
        config.domain_filters = domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(hint) = env.string("SERPER_LOCATION_HINT") {
        config.location_hint = Some(hint);
    }
    if let Some(offline) = env.flag("SERPER_OFFLINE_MODE")? {
        config.offline_mode = offline;
    }

    let cb = &mut config.circuit_breaker;
    if let Some(enabled) = env.flag("MCP_SEARCH_CB_ENABLED")? {
        cb.enabled = enabled;
    }
    env.nonzero("SERPER_CB_FAILURE_THRESHOLD", &mut cb.failure_threshold)?;
    env.nonzero("SERPER_CB_SUCCESS_THRESHOLD", &mut cb.success_threshold)?;
    env.nonzero("SERPER_CB_TIMEOUT", &mut cb.timeout_secs)?;
    env.nonzero("SERPER_CB_MAX_HALF_OPEN", &mut cb.max_half_open_calls)?;

    let http = &mut config.http;
    env.nonzero("SERPER_HTTP_TIMEOUT", &mut http.timeout_secs)?;
    env.nonzero("SERPER_SCRAPE_TIMEOUT", &mut http.scrape_timeout_secs)?;
    env.nonzero("SERPER_FALLBACK_TIMEOUT", &mut http.fallback_timeout_secs)?;
    env.nonzero("SERPER_MAX_CONNS_PER_HOST", &mut http.max_conns_per_host)?;
    env.nonzero("SERPER_MAX_IDLE_CONNS", &mut http.max_idle_conns)?;
    env.nonzero("SERPER_IDLE_CONN_TIMEOUT", &mut http.idle_conn_timeout_secs)?;

    let retry = &mut config.retry;
    env.nonzero("SERPER_RETRY_MAX_ATTEMPTS", &mut retry.max_attempts)?;
    env.nonzero("SERPER_RETRY_INITIAL_DELAY", &mut retry.initial_delay_ms)?;
    env.nonzero("SERPER_RETRY_MAX_DELAY", &mut retry.max_delay_ms)?;
    if let Some(factor) = env.parsed::<f64>("SERPER_RETRY_BACKOFF_FACTOR")? {
        if factor > 0.0 {
            retry.backoff_factor = factor;
        }
    }

    if let Some(url) = env.string("SERPER_SEARCH_ENDPOINT") {
        config.endpoints.serper_search = url;
    }
    if let Some(url) = env.string("SERPER_SCRAPE_ENDPOINT") {
        config.endpoints.serper_scrape = url;
    }

    let obs = &mut config.observability;
    if let Some(level) = env.string("MCP_TOOLS_LOG_LEVEL") {
        obs.log_level = level;
    }
    if let Some(format) = env.parsed("MCP_TOOLS_LOG_FORMAT")? {
        obs.log_format = format;
    }
    if let Some(enabled) = env.flag("MCP_TOOLS_METRICS_ENABLED")? {
        obs.metrics_enabled = enabled;
    }
    if let Some(addr) = env.string("MCP_TOOLS_METRICS_ADDRESS") {
        obs.metrics_address = addr;
    }

    Ok(())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(var)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::Env {
                    var,
                    message: format!("'{}': {}", raw, e),
                })
            })
            .transpose()
    }

    fn flag(&self, var: &'static str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.string(var) else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Env {
                var,
                message: format!("'{}' is not a boolean", raw),
            }),
        }
    }

    fn nonzero<T>(&self, var: &'static str, target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr + Default + PartialEq,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = self.parsed::<T>(var)? {
            if value != T::default() {
                *target = value;
            }
        }
        Ok(())
    }
}
