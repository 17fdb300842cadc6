//! Data model for §3: `QuerySpec`, `Tier`, `Chunk`, and the raw wire shapes
//! returned by the metrics backend.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One `query_range` request, fully specified and ready to dispatch.
///
/// Cloning a `QuerySpec` is a deep copy by construction (every field is
/// owned), which is what the splitter relies on for per-chunk independence
/// — no aliased mutable state the way the original Python `copy.deepcopy`
/// call worked around.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub base_url: String,
    pub cert: Option<String>,
    pub timeout: Duration,
    pub target: String,
    pub params: QueryParams,
}

impl QuerySpec {
    pub fn new(base_url: String, start: u64, end: u64, step: u32, max_source_resolution: &str) -> Self {
        Self {
            base_url,
            cert: None,
            timeout: Duration::from_secs(30),
            target: "query_range".to_string(),
            params: QueryParams {
                query: "ALERTS".to_string(),
                dedup: "true".to_string(),
                partial_response: "false".to_string(),
                start: start.to_string(),
                end: end.to_string(),
                step: step.to_string(),
                max_source_resolution: max_source_resolution.to_string(),
                engine: "thanos".to_string(),
                analyze: "false".to_string(),
            },
        }
    }

    pub fn global_start(&self) -> u64 {
        self.params.start.parse().unwrap_or(0)
    }

    pub fn global_end(&self) -> u64 {
        self.params.end.parse().unwrap_or(0)
    }

    pub fn set_start(&mut self, start: u64) {
        self.params.start = start.to_string();
    }

    pub fn set_end(&mut self, end: u64) {
        self.params.end = end.to_string();
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.target)
    }

    /// Exactly the query-parameter table from spec.md §6, serialized for
    /// the GET request.
    pub fn as_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.params.query.clone()),
            ("dedup", self.params.dedup.clone()),
            ("partial_response", self.params.partial_response.clone()),
            ("start", self.params.start.clone()),
            ("end", self.params.end.clone()),
            ("step", self.params.step.clone()),
            (
                "max_source_resolution",
                self.params.max_source_resolution.clone(),
            ),
            ("engine", self.params.engine.clone()),
            ("analyze", self.params.analyze.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub query: String,
    pub dedup: String,
    pub partial_response: String,
    pub start: String,
    pub end: String,
    pub step: String,
    pub max_source_resolution: String,
    pub engine: String,
    pub analyze: String,
}

/// Resolution tier. Tier 0 is high-resolution/recent; tier 1 is
/// low-resolution/long-term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierIndex {
    Recent = 0,
    LongTerm = 1,
}

#[derive(Debug, Clone)]
pub struct Tier {
    pub index: TierIndex,
    pub step: u32,
    pub max_source_resolution: &'static str,
    pub separator: u64,
    pub spec: QuerySpec,
}

impl Tier {
    pub const RECENT_STEP: u32 = 60;
    pub const RECENT_SEPARATOR: u64 = 86_400;
    pub const LONG_TERM_STEP: u32 = 3600;
    pub const LONG_TERM_SEPARATOR: u64 = 7_776_000;
}

/// A single HTTP request's time window within a tier. `nr` is the dense
/// ordinal assigned by the separator split; `sub_counter` tracks how many
/// `dataK.json` files this chunk (and its halved descendants) has written.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub nr: usize,
    pub start: u64,
    pub end: u64,
    pub spec: QuerySpec,
}

/// Raw `query_range` response shape, deserialized directly from the wire.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireResponse {
    pub status: String,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WireData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<WireSeries>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireSeries {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<(f64, serde_json::Value)>,
}

/// Response after the executor has stripped the per-sample state component
/// (§4.6 "Sample-state stripping"). This is what gets persisted as
/// `dataK.json` and what the compactor consumes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanedResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CleanedData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanedData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<CleanedSeries>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanedSeries {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<f64>,
}

/// Result of dispatching one chunk: normal data, or one of the two
/// canonical sentinels the orchestrator inspects by variant (not by value
/// equality against some magic JSON blob).
#[derive(Debug, Clone)]
pub enum RawResult {
    Success(CleanedResponse),
    ExceededMax,
    Empty,
}
