use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::LogEvent;

/// An accepted event wrapped with ingest metadata.
///
/// Envelopes are immutable after construction except for `retry_count`,
/// which the producer path may advance. The partition key always equals the
/// event's tenant id; the pair is established here and asserted again on the
/// publish path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: LogEvent,
    pub received_at: DateTime<Utc>,
    pub ingest_node: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub batch_id: String,
    #[serde(default)]
    pub batch_index: usize,
    pub retry_count: u32,
    pub partition_key: String,
}

impl Envelope {
    /// Wrap a validated event, keyed by its tenant for broker ordering.
    pub fn new(event: LogEvent, ingest_node: impl Into<String>) -> Self {
        let partition_key = event.tenant_id.clone();
        Self {
            event,
            received_at: Utc::now(),
            ingest_node: ingest_node.into(),
            batch_id: String::new(),
            batch_index: 0,
            retry_count: 0,
            partition_key,
        }
    }

    /// Attach batch identity assigned by the ingest endpoint.
    pub fn with_batch(mut self, batch_id: impl Into<String>, index: usize) -> Self {
        self.batch_id = batch_id.into();
        self.batch_index = index;
        self
    }
}
