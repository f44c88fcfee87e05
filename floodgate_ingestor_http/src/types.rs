use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wire format of a submitted event. The timestamp stays a string here so
/// the ingest pipeline can attempt the full format ladder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEventInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

/// Object wrapper form of the request body: `{"event": {...}}` or
/// `{"events": [...]}`.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub event: Option<LogEventInput>,
    #[serde(default)]
    pub events: Vec<LogEventInput>,
}

/// Per-request ingest outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<IngestError>,
    pub batch_id: String,
}

/// One rejected event, positioned by its index in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub kind: String,
    pub detail: String,
}

/// Body for whole-request failures (bad auth, unparseable JSON, panics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
