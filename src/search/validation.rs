//! Response validation and degraded-response enrichment.
//!
//! Validation only inspects. Enrichment turns an unusable response into a
//! well-formed placeholder carrying `empty_result_reason`, so tool callers
//! always get a payload they can cite.

use serde_json::{json, Value};
use thiserror::Error;

use crate::search::types::{FetchWebpageResponse, Record, SearchResponse};

/// Validation failure on a backend response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation error on {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check that a search response carries at least one citable result.
///
/// A short result list only logs a warning.
pub fn validate_search_response(
    resp: Option<&SearchResponse>,
    min_results: usize,
) -> Result<(), ValidationError> {
    let resp = resp.ok_or_else(|| ValidationError::new("response", "response is nil"))?;

    if resp.organic.is_empty() {
        return Err(ValidationError::new("organic", "no results returned"));
    }

    if min_results > 0 && resp.organic.len() < min_results {
        tracing::warn!(
            expected_min = min_results,
            actual = resp.organic.len(),
            "fewer results than expected, but not failing"
        );
    }

    let mut valid_results = 0;
    for (index, result) in resp.organic.iter().enumerate() {
        let has_title = has_non_empty_string(result, "title");
        let has_link = has_non_empty_string(result, "link");
        if !has_title || !has_link {
            tracing::warn!(
                index = index,
                has_title = has_title,
                has_link = has_link,
                "result missing essential fields"
            );
            continue;
        }
        valid_results += 1;
    }

    if valid_results == 0 {
        return Err(ValidationError::new(
            "organic",
            "no valid results with title and link",
        ));
    }
    Ok(())
}

/// Check that a scrape produced meaningful text.
pub fn validate_fetch_response(
    resp: Option<&FetchWebpageResponse>,
    min_length: usize,
) -> Result<(), ValidationError> {
    let resp = resp.ok_or_else(|| ValidationError::new("response", "response is nil"))?;

    let text = resp.text.trim();
    if text.is_empty() {
        return Err(ValidationError::new("text", "empty text content"));
    }

    let length = text.chars().count();
    if min_length > 0 && length < min_length {
        return Err(ValidationError::new(
            "text",
            format!("text too short: {} chars (min: {})", length, min_length),
        ));
    }
    Ok(())
}

/// Fill an empty search response with a single diagnostic result.
///
/// Existing organic results are left untouched.
pub fn enrich_empty_response(
    resp: Option<SearchResponse>,
    query: &str,
    reason: &str,
) -> SearchResponse {
    let mut resp = resp.unwrap_or_default();

    if resp.organic.is_empty() {
        let mut placeholder = Record::new();
        placeholder.insert("title".into(), json!(format!("No results found for: {}", query)));
        placeholder.insert(
            "link".into(),
            json!(format!("https://google.com/search?q={}", query.replace(' ', "+"))),
        );
        placeholder.insert(
            "snippet".into(),
            json!(format!(
                "The search returned no results. Reason: {}. Try refining your query or checking connectivity.",
                reason
            )),
        );
        placeholder.insert("source".into(), json!("empty_fallback"));
        resp.organic.push(placeholder);
    }

    resp.search_parameters
        .insert("empty_result_reason".into(), json!(reason));
    resp.search_parameters
        .insert("has_results".into(), Value::Bool(!resp.organic.is_empty()));
    resp
}

/// Fill an empty scrape response with placeholder text naming the failure.
pub fn enrich_empty_fetch(
    resp: Option<FetchWebpageResponse>,
    url: &str,
    reason: &str,
) -> FetchWebpageResponse {
    let mut resp = resp.unwrap_or_default();

    if resp.text.trim().is_empty() {
        resp.text = format!("Failed to fetch content from {}. Reason: {}", url, reason);
    }

    resp.metadata
        .insert("empty_result_reason".into(), json!(reason));
    resp.metadata
        .insert("has_content".into(), Value::Bool(!resp.text.trim().is_empty()));
    resp
}

/// Whether a response was produced by one of the enrich functions.
pub fn is_degraded(metadata: &Record) -> bool {
    metadata.contains_key("empty_result_reason")
}

fn has_non_empty_string(record: &Record, key: &str) -> bool {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}
