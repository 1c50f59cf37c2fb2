//! search-gateway: command-line front end for the search client.
//!
//! # Architecture Overview
//!
//! ```text
//!     CLI (search / fetch)
//!          │
//!          ▼
//!     ┌──────────────────────────────────────────────────┐
//!     │ SearchClient                                     │
//!     │   enrich query → offline check → pick backend    │
//!     │          │                                       │
//!     │          ▼                                       │
//!     │   circuit breaker (per backend)                  │
//!     │          │                                       │
//!     │          ▼                                       │
//!     │   retry with backoff ──▶ HTTP transport ─────────┼──▶ Serper / SearXNG
//!     │          │                                       │
//!     │          ▼                                       │
//!     │   validate → enrich placeholder on empty results │
//!     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use search_gateway::config;
use search_gateway::observability;
use search_gateway::search::{FetchWebpageRequest, SearchRequest, TbsTimeRange};
use search_gateway::SearchClient;

#[derive(Parser)]
#[command(name = "search-gateway")]
#[command(about = "Resilient web search and scrape client", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a web search
    Search {
        query: String,
        /// Number of results
        #[arg(long)]
        num: Option<u32>,
        #[arg(long)]
        page: Option<u32>,
        /// Restrict results to a domain (repeatable)
        #[arg(long = "domain")]
        domains: Vec<String>,
        /// Time filter (qdr:h, qdr:d, qdr:w, qdr:m, qdr:y)
        #[arg(long, value_parser = parse_tbs)]
        tbs: Option<TbsTimeRange>,
        #[arg(long)]
        location: Option<String>,
        /// Refuse outbound calls (`--offline false` overrides the config)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        offline: Option<bool>,
    },
    /// Fetch a page's text content
    Fetch {
        url: String,
        /// Ask the scrape backend for markdown as well
        #[arg(long)]
        markdown: bool,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        offline: Option<bool>,
    },
}

fn parse_tbs(value: &str) -> Result<TbsTimeRange, String> {
    TbsTimeRange::parse(value).ok_or_else(|| format!("unsupported time filter '{}'", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    observability::logging::init(&config.observability)?;

    let client = SearchClient::new(config)?;
    let config = client.config();

    tracing::info!(
        engine = %config.engine,
        offline_mode = config.offline_mode,
        circuit_breaker_enabled = config.circuit_breaker.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        observability::metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let output = match cli.command {
        Commands::Search {
            query,
            num,
            page,
            domains,
            tbs,
            location,
            offline,
        } => {
            let request = SearchRequest {
                num,
                page,
                domain_allow_list: domains,
                tbs,
                location,
                offline_mode: offline,
                ..SearchRequest::new(query)
            };
            serde_json::to_string_pretty(&client.search(&cancel, request).await?)?
        }
        Commands::Fetch {
            url,
            markdown,
            offline,
        } => {
            let request = FetchWebpageRequest {
                include_markdown: markdown.then_some(true),
                offline_mode: offline,
                ..FetchWebpageRequest::new(url)
            };
            serde_json::to_string_pretty(&client.fetch_webpage(&cancel, request).await?)?
        }
    };

    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_flag(args: &[&str]) -> Option<bool> {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Search { offline, .. } | Commands::Fetch { offline, .. } => offline,
        }
    }

    #[test]
    fn test_offline_flag_is_tri_state() {
        assert_eq!(offline_flag(&["search-gateway", "search", "rust"]), None);
        assert_eq!(offline_flag(&["search-gateway", "search", "rust", "--offline"]), Some(true));
        assert_eq!(
            offline_flag(&["search-gateway", "fetch", "https://example.com", "--offline", "false"]),
            Some(false)
        );
    }

    #[test]
    fn test_search_arguments() {
        let cli = Cli::try_parse_from([
            "search-gateway",
            "--config",
            "gateway.toml",
            "search",
            "tokio",
            "--domain",
            "tokio.rs",
            "--domain",
            "docs.rs",
            "--tbs",
            "qdr:w",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("gateway.toml")));
        match cli.command {
            Commands::Search { domains, tbs, .. } => {
                assert_eq!(domains, vec!["tokio.rs".to_string(), "docs.rs".to_string()]);
                assert_eq!(tbs, Some(TbsTimeRange::PastWeek));
            }
            Commands::Fetch { .. } => panic!("expected search"),
        }
        assert!(Cli::try_parse_from(["search-gateway", "search", "q", "--tbs", "qdr:x"]).is_err());
    }
}
