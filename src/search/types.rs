//! Request and response types shared with the MCP tool layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loose key/value record, as returned by the search backends.
pub type Record = Map<String, Value>;

/// Serper's `tbs` time filter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TbsTimeRange {
    #[serde(rename = "qdr:h")]
    PastHour,
    #[serde(rename = "qdr:d")]
    PastDay,
    #[serde(rename = "qdr:w")]
    PastWeek,
    #[serde(rename = "qdr:m")]
    PastMonth,
    #[serde(rename = "qdr:y")]
    PastYear,
}

impl TbsTimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TbsTimeRange::PastHour => "qdr:h",
            TbsTimeRange::PastDay => "qdr:d",
            TbsTimeRange::PastWeek => "qdr:w",
            TbsTimeRange::PastMonth => "qdr:m",
            TbsTimeRange::PastYear => "qdr:y",
        }
    }

    /// Parse the Serper form (`qdr:w`). Unknown values mean "any time".
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "qdr:h" => Some(TbsTimeRange::PastHour),
            "qdr:d" => Some(TbsTimeRange::PastDay),
            "qdr:w" => Some(TbsTimeRange::PastWeek),
            "qdr:m" => Some(TbsTimeRange::PastMonth),
            "qdr:y" => Some(TbsTimeRange::PastYear),
            _ => None,
        }
    }
}

/// A web search query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    /// Region code (ISO 3166-1 alpha-2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gl: Option<String>,
    /// Language code (ISO 639-1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Soft location preference, used when `location` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocorrect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbs: Option<TbsTimeRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_allow_list: Vec<String>,
    /// Overrides the client-wide offline default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_mode: Option<bool>,
}

impl SearchRequest {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }
}

/// Search results in Serper's shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "searchParameters", default)]
    pub search_parameters: Record,
    #[serde(default)]
    pub organic: Vec<Record>,
    #[serde(rename = "knowledgeGraph", default, skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<Record>,
    #[serde(rename = "answerBox", default, skip_serializing_if = "Option::is_none")]
    pub answer_box: Option<Record>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Record>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub news: Vec<Record>,
}

/// A page scrape request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchWebpageRequest {
    pub url: String,
    #[serde(rename = "includeMarkdown", default, skip_serializing_if = "Option::is_none")]
    pub include_markdown: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_mode: Option<bool>,
}

impl FetchWebpageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a scrape as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    /// Content is a placeholder or failed validation.
    Partial,
    Failed,
}

/// Scraped page content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchWebpageResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default)]
    pub metadata: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FetchStatus>,
    /// Why the content is degraded, when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
