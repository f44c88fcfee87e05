use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BrokerError;

/// A keyed record as handed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    /// Partition key; equal to the envelope's tenant id.
    pub key: String,
    /// Serialized envelope.
    pub value: Vec<u8>,
    /// Record headers, including `content-type` and the identity headers.
    pub headers: Vec<(String, Vec<u8>)>,
    /// Record timestamp; the envelope's `received_at`.
    pub timestamp: DateTime<Utc>,
}

impl BrokerRecord {
    /// Look up a header value by name.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_slice())
    }
}

/// One writer handle onto the broker.
///
/// Implementations perform a single attempt per call; retry policy lives in
/// [`crate::LogProducer`]. A handle is used by at most one caller at a time,
/// enforced by the producer's pool.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Write all records, bounded by `timeout`. A failed write reports the
    /// whole call as failed; partial commits are possible with real brokers
    /// and are absorbed by the at-least-once contract.
    async fn write(&self, records: Vec<BrokerRecord>, timeout: Duration)
        -> Result<(), BrokerError>;

    /// Cheap liveness probe; must not write.
    async fn health_check(&self, timeout: Duration) -> Result<(), BrokerError>;

    /// Release the handle's resources. Subsequent writes fail.
    async fn close(&self) -> Result<(), BrokerError>;
}
