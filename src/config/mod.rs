//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, overlay environment variables)
//!     → validation.rs (semantic checks)
//!     → SearchConfig (validated, immutable)
//!     → handed to SearchClient at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing reads the environment later
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, load_with, ConfigError};
pub use schema::{
    BreakerSettings, EndpointConfig, Engine, HttpConfig, LogFormat, ObservabilityConfig,
    RetrySettings, SearchConfig,
};
