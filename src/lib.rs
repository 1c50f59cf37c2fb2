//! Resilient search and scrape client for MCP tools.

pub mod config;
pub mod observability;
pub mod resilience;
pub mod search;

pub use config::schema::SearchConfig;
pub use search::{SearchClient, SearchError, WebSearch};
