//! Query rewriting: domain allow-lists and time filters.

use std::collections::HashSet;

use url::Url;

use crate::search::types::TbsTimeRange;

/// Normalize an operator- or user-supplied domain.
///
/// Lower-cases, drops `#` comments and anything after the first word,
/// strips scheme, path and a leading `www.`. Returns `None` for values that
/// are not plain host names.
pub fn sanitize_domain(value: &str) -> Option<String> {
    let mut value = value.trim().to_lowercase();
    if let Some(idx) = value.find('#') {
        value.truncate(idx);
    }
    let mut value = value.split_whitespace().next()?.to_string();

    if value.contains("://") {
        let parsed = Url::parse(&value).ok()?;
        value = parsed.host_str()?.to_string();
    }
    if let Some(slash) = value.find('/') {
        value.truncate(slash);
    }

    let value = value.strip_prefix("www.").unwrap_or(&value);
    let value = value.trim_matches(|c| c == '.' || c == '-');
    if value.is_empty() {
        return None;
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return None;
    }
    Some(value.to_string())
}

/// Merge configured and per-request domains: sanitized, deduplicated,
/// configured ones first.
pub fn merge_domains(configured: &[String], requested: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    configured
        .iter()
        .chain(requested)
        .filter_map(|d| sanitize_domain(d))
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

/// Rewrite `query` to `(query) (site:a OR site:b)`.
pub fn apply_domain_filter(query: &str, domains: &[String]) -> String {
    let filters: Vec<String> = domains
        .iter()
        .filter(|d| !d.is_empty())
        .map(|d| format!("site:{}", d))
        .collect();
    if filters.is_empty() {
        return query.to_string();
    }

    let filter_expr = filters.join(" OR ");
    let query = query.trim();
    if query.is_empty() {
        return filter_expr;
    }
    format!("({}) ({})", query, filter_expr)
}

/// Translate Serper's `tbs` filter to SearXNG's `time_range`.
///
/// SearXNG has no hour granularity, so past-hour widens to a day.
pub fn map_tbs_to_searxng(tbs: TbsTimeRange) -> &'static str {
    match tbs {
        TbsTimeRange::PastHour | TbsTimeRange::PastDay => "day",
        TbsTimeRange::PastWeek => "week",
        TbsTimeRange::PastMonth => "month",
        TbsTimeRange::PastYear => "year",
    }
}
