//! Search subsystem.
//!
//! # Data Flow
//! ```text
//! MCP tool call (google_search / scrape)
//!     → client.rs (enrich, offline check, backend dispatch)
//!     → query.rs (domain allow-list, time filter translation)
//!     → transport.rs (one HTTP exchange, cancellable)
//!     → validation.rs (inspect, enrich empty payloads)
//!     → html.rs (visible text for the direct fetch fallback)
//! ```
//!
//! # Design Decisions
//! - Payload types are loose JSON records; backends add fields freely
//! - The transport is a trait so the client can be driven without a network

pub mod client;
pub mod html;
pub mod query;
pub mod transport;
pub mod types;
pub mod validation;

pub use client::{BackendError, SearchClient, SearchError, WebSearch};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use types::{
    FetchStatus, FetchWebpageRequest, FetchWebpageResponse, Record, SearchRequest, SearchResponse, TbsTimeRange,
};
pub use validation::ValidationError;
