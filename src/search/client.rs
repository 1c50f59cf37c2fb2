//! Search client: one entry point over Serper, SearXNG and a direct fetch
//! fallback.
//!
//! # Data Flow
//! ```text
//! search(request)
//!     → enrich_query (domain allow-list, location hint)
//!     → offline check
//!     → search_via_serper | search_via_searxng
//!         → CircuitBreaker::execute
//!             → with_retry → HttpTransport
//!         → validate, enrich on failure
//!         → stamp searchParameters
//!
//! fetch_webpage(request)
//!     → offline check
//!     → fetch_via_serper (only with an API key)
//!     → fetch_fallback (on error or a degraded scrape)
//! ```
//!
//! # Design Decisions
//! - Hard errors only for missing configuration, offline mode, open
//!   breakers and failed backends; empty payloads degrade to placeholders
//! - The breaker sees the outcome of the retry loop, not validation
//! - The direct fetch fallback has no breaker and a two-attempt budget

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{Engine, SearchConfig};
use crate::observability::metrics;
use crate::resilience::{
    with_retry, BreakerError, CircuitBreaker, CircuitState, RetryConfig, RetryError,
};
use crate::search::html::extract_visible_text;
use crate::search::query::{apply_domain_filter, map_tbs_to_searxng, merge_domains};
use crate::search::transport::{
    execute_cancellable, ClientProfile, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, TransportError,
};
use crate::search::types::{
    FetchStatus, FetchWebpageRequest, FetchWebpageResponse, Record, SearchRequest, SearchResponse,
};
use crate::search::validation::{
    enrich_empty_fetch, enrich_empty_response, is_degraded, validate_fetch_response,
    validate_search_response,
};

/// Scrapes shorter than this are treated as empty.
const MIN_FETCH_LENGTH: usize = 50;
const FALLBACK_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_SEARXNG_RESULTS: usize = 10;
const FALLBACK_PROVIDER: &str = "direct-http";

/// Failure of a breaker-guarded backend call.
pub type BackendError = BreakerError<RetryError<TransportError>>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Missing API key or backend URL.
    #[error("{0}")]
    Configuration(String),

    #[error("{operation} unavailable: offline mode is enabled")]
    Offline { operation: &'static str },

    /// The backend's breaker is open.
    #[error("{engine} search temporarily unavailable (recovering from errors), retry in 1 minute")]
    TemporarilyUnavailable { engine: Engine },

    #[error("{engine} search failed: {source}")]
    Backend { engine: Engine, source: BackendError },

    /// The direct fetch fallback failed and nothing else produced content.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        source: RetryError<TransportError>,
    },
}

/// Search and scrape contract consumed by the MCP tool layer.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(
        &self,
        cancel: &CancellationToken,
        request: SearchRequest,
    ) -> Result<SearchResponse, SearchError>;

    async fn fetch_webpage(
        &self,
        cancel: &CancellationToken,
        request: FetchWebpageRequest,
    ) -> Result<FetchWebpageResponse, SearchError>;
}

/// Resilient client over the configured search backends.
///
/// Owns one circuit breaker per backend for its whole lifetime.
pub struct SearchClient {
    config: SearchConfig,
    transport: Arc<dyn HttpTransport>,
    retry: RetryConfig,
    serper_breaker: CircuitBreaker,
    searxng_breaker: CircuitBreaker,
}

impl SearchClient {
    /// Create a client with pooled reqwest connections.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let transport = ReqwestTransport::new(&config.http).map_err(|e| {
            SearchError::Configuration(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: SearchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let breaker_config = config.breaker_config();
        Self {
            serper_breaker: CircuitBreaker::new("search-serper", breaker_config.clone()),
            searxng_breaker: CircuitBreaker::new("search-searxng", breaker_config),
            retry: config.retry_config(),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The breaker guarding `engine`.
    pub fn breaker(&self, engine: Engine) -> &CircuitBreaker {
        match engine {
            Engine::Serper => &self.serper_breaker,
            Engine::Searxng => &self.searxng_breaker,
        }
    }

    pub async fn search(
        &self,
        cancel: &CancellationToken,
        request: SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let query = self.enrich_query(request);
        let offline = self.resolve_offline(query.offline_mode);
        let engine = self.config.engine;

        tracing::debug!(
            operation = "search",
            query = %query.q,
            engine = %engine,
            offline_mode = offline,
            "search client dispatching"
        );

        if offline {
            return Err(SearchError::Offline {
                operation: "search",
            });
        }

        let result = match engine {
            Engine::Searxng => {
                if !self.has_searxng_url() {
                    return Err(SearchError::Configuration(
                        "searxng url not configured".to_string(),
                    ));
                }
                self.search_via_searxng(cancel, &query).await
            }
            Engine::Serper => {
                if !self.has_serper_api_key() {
                    return Err(SearchError::Configuration(
                        "serper api key not configured".to_string(),
                    ));
                }
                self.search_via_serper(cancel, &query).await
            }
        };

        match result {
            Ok(response) => {
                tracing::info!(
                    engine = %engine,
                    query = %query.q,
                    result_count = response.organic.len(),
                    "search completed using engine"
                );
                Ok(response)
            }
            Err(err) if err.is_open() || self.breaker(engine).state() == CircuitState::Open => {
                tracing::warn!(engine = %engine, error = %err, "search backend circuit is open");
                Err(SearchError::TemporarilyUnavailable { engine })
            }
            Err(err) => Err(SearchError::Backend {
                engine,
                source: err,
            }),
        }
    }

    pub async fn fetch_webpage(
        &self,
        cancel: &CancellationToken,
        request: FetchWebpageRequest,
    ) -> Result<FetchWebpageResponse, SearchError> {
        let offline = self.resolve_offline(request.offline_mode);
        tracing::debug!(
            operation = "scrape",
            url = %request.url,
            offline_mode = offline,
            serper_enabled = self.has_serper_api_key(),
            "scrape client dispatching"
        );

        if offline {
            return Err(SearchError::Offline {
                operation: "scrape",
            });
        }

        let mut degraded = None;
        if self.has_serper_api_key() {
            match self.fetch_via_serper(cancel, &request).await {
                Ok(page) if !is_degraded(&page.metadata) => {
                    tracing::info!(
                        engine = "serper",
                        url = %request.url,
                        text_length = page.text.len(),
                        "scrape completed using engine"
                    );
                    return Ok(with_fetch_status(page));
                }
                Ok(page) => {
                    tracing::debug!(url = %request.url, "serper scrape was empty, trying direct fetch");
                    degraded = Some(page);
                }
                Err(err) => {
                    tracing::debug!(url = %request.url, error = %err, "serper scrape failed, trying direct fetch");
                }
            }
        }

        match self.fetch_fallback(cancel, &request).await {
            Ok(page) => match degraded {
                Some(primary) if is_degraded(&page.metadata) => Ok(with_fetch_status(primary)),
                _ => {
                    tracing::info!(
                        engine = FALLBACK_PROVIDER,
                        url = %request.url,
                        text_length = page.text.len(),
                        "scrape completed using engine"
                    );
                    Ok(with_fetch_status(page))
                }
            },
            Err(err) => match degraded {
                Some(primary) => Ok(with_fetch_status(primary)),
                None => Err(SearchError::Fetch {
                    url: request.url,
                    source: err,
                }),
            },
        }
    }

    /// Apply configured domain filters and the default location hint.
    pub fn enrich_query(&self, mut query: SearchRequest) -> SearchRequest {
        let merged = merge_domains(&self.config.domain_filters, &query.domain_allow_list);
        if !merged.is_empty() {
            query.q = apply_domain_filter(&query.q, &merged);
            query.domain_allow_list = merged;
        }

        if query.location_hint.is_none() {
            query.location_hint = self
                .config
                .location_hint
                .as_deref()
                .map(str::trim)
                .filter(|hint| !hint.is_empty())
                .map(str::to_string);
        }
        query
    }

    /// Request-level override first, then the client default.
    pub fn resolve_offline(&self, requested: Option<bool>) -> bool {
        requested.unwrap_or(self.config.offline_mode)
    }

    async fn search_via_serper(
        &self,
        cancel: &CancellationToken,
        query: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        let request = HttpRequest::post_json(
            &self.config.endpoints.serper_search,
            serper_search_body(query),
            self.timeout(self.config.http.timeout_secs),
        )
        .header("X-API-KEY", self.config.serper_api_key.as_str());

        let start = Instant::now();
        let transport = self.transport.as_ref();
        let retry = &self.retry;
        let request = &request;
        let result = self
            .serper_breaker
            .execute("serper_search", move || {
                with_retry(cancel, retry, "serper_search", move || {
                    call_json::<SearchResponse>(transport, cancel, request.clone())
                })
            })
            .await;
        self.record_call("search", Engine::Serper, &result, start);

        let mut response = result.map_err(|err| {
            tracing::error!(service = "serper", operation = "search", error = %err, "serper search failed");
            err
        })?;

        if let Err(invalid) = validate_search_response(Some(&response), 0) {
            tracing::warn!(service = "serper", error = %invalid, "serper search returned invalid response");
            response = enrich_empty_response(Some(response), &query.q, &invalid.to_string());
        }
        stamp_search_parameters(&mut response.search_parameters, Engine::Serper, query);
        Ok(response)
    }

    async fn search_via_searxng(
        &self,
        cancel: &CancellationToken,
        query: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        let request = self.searxng_request(query);

        let start = Instant::now();
        let transport = self.transport.as_ref();
        let retry = &self.retry;
        let request = &request;
        let result = self
            .searxng_breaker
            .execute("searxng_search", move || {
                with_retry(cancel, retry, "searxng_search", move || {
                    call_json::<SearxngResponse>(transport, cancel, request.clone())
                })
            })
            .await;
        self.record_call("search", Engine::Searxng, &result, start);

        let raw = result.map_err(|err| {
            tracing::error!(service = "searxng", operation = "search", error = %err, "searxng search failed");
            err
        })?;

        let limit = query
            .num
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_SEARXNG_RESULTS);
        let organic = raw
            .results
            .into_iter()
            .take(limit)
            .map(SearxngResult::into_record)
            .collect();

        let mut response = SearchResponse {
            organic,
            ..SearchResponse::default()
        };
        if let Err(invalid) = validate_search_response(Some(&response), 0) {
            tracing::warn!(service = "searxng", error = %invalid, "searxng search returned invalid response");
            response = enrich_empty_response(Some(response), &query.q, &invalid.to_string());
        }
        stamp_search_parameters(&mut response.search_parameters, Engine::Searxng, query);
        Ok(response)
    }

    fn searxng_request(&self, query: &SearchRequest) -> HttpRequest {
        let endpoint = format!("{}/search", self.config.searxng_url.trim().trim_end_matches('/'));
        let mut request = HttpRequest::get(endpoint, self.timeout(self.config.http.timeout_secs))
            .query_param("q", query.q.as_str())
            .query_param("format", "json")
            .query_param("safesearch", "1");

        if let Some(language) = &query.hl {
            request = request.query_param("language", language.as_str());
        }
        if let Some(page) = query.page.filter(|p| *p > 1) {
            request = request.query_param("p", page.to_string());
        }
        if let Some(num) = query.num.filter(|n| *n > 0) {
            request = request.query_param("num", num.to_string());
        }
        if let Some(tbs) = query.tbs {
            request = request.query_param("time_range", map_tbs_to_searxng(tbs));
        }
        request
    }

    async fn fetch_via_serper(
        &self,
        cancel: &CancellationToken,
        query: &FetchWebpageRequest,
    ) -> Result<FetchWebpageResponse, BackendError> {
        let mut body = json!({ "url": query.url });
        if let Some(markdown) = query.include_markdown {
            body["includeMarkdown"] = Value::Bool(markdown);
        }
        let request = HttpRequest::post_json(
            &self.config.endpoints.serper_scrape,
            body,
            self.timeout(self.config.http.scrape_timeout_secs),
        )
        .header("X-API-KEY", self.config.serper_api_key.as_str());

        let start = Instant::now();
        let transport = self.transport.as_ref();
        let retry = &self.retry;
        let request = &request;
        let result = self
            .serper_breaker
            .execute("serper_scrape", move || {
                with_retry(cancel, retry, "serper_scrape", move || {
                    call_json::<FetchWebpageResponse>(transport, cancel, request.clone())
                })
            })
            .await;
        self.record_call("scrape", Engine::Serper, &result, start);

        let mut page = result.map_err(|err| {
            tracing::error!(service = "serper", operation = "scrape", url = %query.url, error = %err, "serper scrape failed");
            err
        })?;

        if let Err(invalid) = validate_fetch_response(Some(&page), MIN_FETCH_LENGTH) {
            tracing::warn!(service = "serper", url = %query.url, error = %invalid, "serper scrape returned invalid response");
            page = enrich_empty_fetch(Some(page), &query.url, &invalid.to_string());
        }
        page.metadata
            .insert("engine".into(), json!(Engine::Serper.as_str()));
        Ok(page)
    }

    /// Direct GET of the target page, reduced to its visible text.
    async fn fetch_fallback(
        &self,
        cancel: &CancellationToken,
        query: &FetchWebpageRequest,
    ) -> Result<FetchWebpageResponse, RetryError<TransportError>> {
        let retry = RetryConfig {
            max_attempts: FALLBACK_MAX_ATTEMPTS,
            ..self.retry.clone()
        };
        let request = HttpRequest::get(
            query.url.as_str(),
            self.timeout(self.config.http.fallback_timeout_secs),
        )
        .profile(ClientProfile::Browser);

        let start = Instant::now();
        let transport = self.transport.as_ref();
        let request = &request;
        let result = with_retry(cancel, &retry, "fallback_fetch", move || {
            call(transport, cancel, request.clone())
        })
        .await;

        metrics::record_provider_request(
            "scrape",
            FALLBACK_PROVIDER,
            if result.is_ok() { "success" } else { "error" },
        );
        metrics::record_provider_latency(FALLBACK_PROVIDER, start);

        let response = result.map_err(|err| {
            tracing::error!(service = "fallback", url = %query.url, error = %err, "fallback fetch failed");
            err
        })?;

        let raw = response.text();
        let mut text = extract_visible_text(&raw);
        if text.is_empty() {
            text = raw;
        }

        let mut metadata = Record::new();
        metadata.insert("source".into(), json!(query.url));
        metadata.insert(
            "contentType".into(),
            json!(response.content_type.unwrap_or_default()),
        );
        metadata.insert("fallback_mode".into(), Value::Bool(true));

        let mut page = FetchWebpageResponse {
            text,
            metadata,
            ..FetchWebpageResponse::default()
        };
        if let Err(invalid) = validate_fetch_response(Some(&page), MIN_FETCH_LENGTH) {
            tracing::warn!(service = "fallback", url = %query.url, error = %invalid, "fallback fetch returned invalid response");
            page = enrich_empty_fetch(Some(page), &query.url, &invalid.to_string());
        }
        Ok(page)
    }

    fn record_call<T>(
        &self,
        operation: &str,
        engine: Engine,
        result: &Result<T, BackendError>,
        start: Instant,
    ) {
        let status = match result {
            Ok(_) => "success",
            Err(err) if err.is_open() => "circuit_open",
            Err(_) => "error",
        };
        metrics::record_provider_request(operation, engine.as_str(), status);
        metrics::record_provider_latency(engine.as_str(), start);
        metrics::record_circuit_state(engine.as_str(), self.breaker(engine).state());
    }

    fn timeout(&self, secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn has_serper_api_key(&self) -> bool {
        !self.config.serper_api_key.trim().is_empty()
    }

    fn has_searxng_url(&self) -> bool {
        !self.config.searxng_url.trim().is_empty()
    }
}

#[async_trait]
impl WebSearch for SearchClient {
    async fn search(
        &self,
        cancel: &CancellationToken,
        request: SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        SearchClient::search(self, cancel, request).await
    }

    async fn fetch_webpage(
        &self,
        cancel: &CancellationToken,
        request: FetchWebpageRequest,
    ) -> Result<FetchWebpageResponse, SearchError> {
        SearchClient::fetch_webpage(self, cancel, request).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearxngResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    engine: Option<String>,
}

impl SearxngResult {
    fn into_record(self) -> Record {
        let mut record = Record::new();
        record.insert("title".into(), json!(self.title.unwrap_or_default()));
        record.insert("link".into(), json!(self.url.unwrap_or_default()));
        record.insert(
            "description".into(),
            json!(self.content.unwrap_or_default().trim()),
        );
        record.insert("source".into(), json!("searxng"));
        record.insert("engine".into(), json!(self.engine.unwrap_or_default()));
        record
    }
}

fn serper_search_body(query: &SearchRequest) -> Value {
    let mut body = Record::new();
    body.insert("q".into(), json!(query.q));
    if let Some(gl) = &query.gl {
        body.insert("gl".into(), json!(gl));
    }
    if let Some(hl) = &query.hl {
        body.insert("hl".into(), json!(hl));
    }
    if let Some(location) = query.location.as_ref().or(query.location_hint.as_ref()) {
        body.insert("location".into(), json!(location));
    }
    if let Some(num) = query.num {
        body.insert("num".into(), json!(num));
    }
    if let Some(page) = query.page {
        body.insert("page".into(), json!(page));
    }
    if let Some(autocorrect) = query.autocorrect {
        body.insert("autocorrect".into(), json!(autocorrect));
    }
    if let Some(tbs) = query.tbs {
        body.insert("tbs".into(), json!(tbs.as_str()));
    }
    Value::Object(body)
}

fn stamp_search_parameters(params: &mut Record, engine: Engine, query: &SearchRequest) {
    params.insert("engine".into(), json!(engine.as_str()));
    params.insert("q".into(), json!(query.q));
    params.insert("live".into(), Value::Bool(true));
    params.insert("domain_allow_list".into(), json!(query.domain_allow_list));
    if let Some(hint) = &query.location_hint {
        params.insert("location_hint".into(), json!(hint));
    }
}

/// Report a degraded page as partial, carrying its validation reason.
fn with_fetch_status(mut page: FetchWebpageResponse) -> FetchWebpageResponse {
    let reason = page
        .metadata
        .get("empty_result_reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    page.status = Some(match reason {
        None => FetchStatus::Success,
        Some(_) if !page.text.trim().is_empty() => FetchStatus::Partial,
        Some(_) => FetchStatus::Failed,
    });
    page.error = reason;
    page
}

/// One attempt: send, reject non-2xx.
async fn call(
    transport: &dyn HttpTransport,
    cancel: &CancellationToken,
    request: HttpRequest,
) -> Result<HttpResponse, TransportError> {
    execute_cancellable(transport, cancel, request)
        .await?
        .error_for_status()
}

/// One attempt: send, reject non-2xx, decode JSON.
async fn call_json<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    cancel: &CancellationToken,
    request: HttpRequest,
) -> Result<T, TransportError> {
    call(transport, cancel, request).await?.json()
}
