//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Execute one backend request with its own timeout
//! - Translate client failures into errors whose text the retry
//!   classifier understands (status codes, "timeout", "connection refused")
//! - Race every call against the caller's cancellation token
//!
//! The [`HttpTransport`] trait is the seam the search client is tested
//! through; [`ReqwestTransport`] is the pooled production implementation.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::HttpConfig;

/// User agent sent to API backends.
pub const API_USER_AGENT: &str = "Jan-MCP-Tools/1.0";

/// User agent sent by the direct fetch fallback, to get past basic bot filters.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Error bodies are clipped to this many bytes.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Which pooled client profile a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
    /// JSON APIs (Serper, SearXNG).
    Api,
    /// Direct page fetches with browser-like headers.
    Browser,
}

/// A backend request, independent of the HTTP client library.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub timeout: Duration,
    pub profile: ClientProfile,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            json: None,
            timeout,
            profile: ClientProfile::Api,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            json: Some(body),
            ..Self::get(url, timeout)
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn profile(mut self, profile: ClientProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        let mut body = self.text();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(TransportError::Status {
            status: self.status,
            body,
        })
    }

    /// Decode a JSON body.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request cancelled")]
    Cancelled,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Pooled reqwest clients, one per [`ClientProfile`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    api: reqwest::Client,
    browser: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        // reqwest pools per host only; the global idle limit caps it.
        let idle_per_host = config.max_conns_per_host.min(config.max_idle_conns);
        let idle_timeout = Duration::from_secs(config.idle_conn_timeout_secs);

        let mut api_headers = HeaderMap::new();
        api_headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let api = reqwest::Client::builder()
            .default_headers(api_headers)
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .build()?;

        let mut browser_headers = HeaderMap::new();
        browser_headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        browser_headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        browser_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let browser = reqwest::Client::builder()
            .default_headers(browser_headers)
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .build()?;

        Ok(Self { api, browser })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = match request.profile {
            ClientProfile::Api => &self.api,
            ClientProfile::Browser => &self.browser,
        };
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(e, request.timeout))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.send(request).await
    }
}

/// Run a transport call, giving up as soon as `cancel` fires.
pub async fn execute_cancellable(
    transport: &dyn HttpTransport,
    cancel: &CancellationToken,
    request: HttpRequest,
) -> Result<HttpResponse, TransportError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        result = transport.execute(request) => result,
    }
}

fn classify_reqwest_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    let detail = error_chain(&err);
    if err.is_connect() {
        TransportError::Connect(detail)
    } else {
        TransportError::Request(detail)
    }
}

/// `Display` of an error followed by each of its sources.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
