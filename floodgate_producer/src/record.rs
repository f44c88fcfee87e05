use floodgate_core::Envelope;
use snafu::ResultExt;

use crate::client::BrokerRecord;
use crate::error::{ProducerError, SerializeSnafu};

/// Encode an envelope into its broker record.
///
/// The value is the JSON encoding of the whole envelope; metadata keys are
/// stored in a sorted map, so the bytes are deterministic for a given
/// envelope. Serialization failures are not retryable.
pub fn encode_envelope(envelope: &Envelope) -> Result<BrokerRecord, ProducerError> {
    assert_eq!(
        envelope.partition_key, envelope.event.tenant_id,
        "envelope partition key must equal the event tenant id"
    );

    let value = serde_json::to_vec(envelope).context(SerializeSnafu {
        event_id: envelope.event.id.clone(),
    })?;

    Ok(BrokerRecord {
        key: envelope.partition_key.clone(),
        value,
        headers: vec![
            ("content-type".to_owned(), b"application/json".to_vec()),
            (
                "tenant_id".to_owned(),
                envelope.event.tenant_id.clone().into_bytes(),
            ),
            (
                "event_id".to_owned(),
                envelope.event.id.clone().into_bytes(),
            ),
            (
                "ingest_node".to_owned(),
                envelope.ingest_node.clone().into_bytes(),
            ),
        ],
        timestamp: envelope.received_at,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use floodgate_core::{Envelope, LogEvent};

    use super::*;

    fn envelope() -> Envelope {
        let event = LogEvent {
            id: "evt-1".to_owned(),
            tenant_id: "tenant-1".to_owned(),
            timestamp: "2024-01-15T10:30:00Z".parse().unwrap(),
            severity: "INFO".to_owned(),
            source: "api-gateway".to_owned(),
            message: "hello".to_owned(),
            metadata: BTreeMap::new(),
            trace_id: None,
            span_id: None,
        };
        Envelope::new(event, "node-1").with_batch("b-1", 0)
    }

    #[test]
    fn key_is_partition_key() {
        let original = envelope();
        let record = encode_envelope(&original).unwrap();
        assert_eq!(record.key, "tenant-1");
        assert_eq!(record.timestamp, original.received_at);
    }

    #[test]
    fn headers_carry_identity() {
        let record = encode_envelope(&envelope()).unwrap();
        assert_eq!(record.header("tenant_id"), Some(b"tenant-1".as_slice()));
        assert_eq!(record.header("event_id"), Some(b"evt-1".as_slice()));
        assert_eq!(record.header("ingest_node"), Some(b"node-1".as_slice()));
        assert_eq!(
            record.header("content-type"),
            Some(b"application/json".as_slice())
        );
    }

    #[test]
    fn value_decodes_back_to_envelope() {
        let original = envelope();
        let record = encode_envelope(&original).unwrap();
        let decoded: Envelope = serde_json::from_slice(&record.value).unwrap();
        assert_eq!(decoded.event.id, "evt-1");
        assert_eq!(decoded.partition_key, "tenant-1");
    }

    #[test]
    fn encoding_is_deterministic() {
        let original = envelope();
        let first = encode_envelope(&original).unwrap();
        let second = encode_envelope(&original).unwrap();
        assert_eq!(first.value, second.value);
    }

    #[test]
    #[should_panic(expected = "partition key")]
    fn mismatched_partition_key_panics() {
        let mut bad = envelope();
        bad.partition_key = "other-tenant".to_owned();
        let _ = encode_envelope(&bad);
    }
}
