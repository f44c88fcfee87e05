use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{
    EmptyIdSnafu, EmptyMessageSnafu, EmptySourceSnafu, EmptyTenantIdSnafu, FutureTimestampSnafu,
    InvalidSeveritySnafu, MessageTooLongSnafu, TooManyMetadataSnafu, ValidationError,
    ZeroTimestampSnafu,
};

/// Maximum accepted message length, in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 65_536;

/// Maximum number of metadata keys per event.
pub const MAX_METADATA_KEYS: usize = 50;

/// Accepted timestamps may run at most this far ahead of the ingest clock.
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 60;

/// The severity levels accepted after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Parse an already upper-cased severity name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log event submitted by a tenant.
///
/// The severity is kept as a string so that validation can report an invalid
/// level in its contractual position, after the timestamp checks; a validated
/// event's severity is always one of [`Severity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

impl LogEvent {
    /// Check that the event satisfies the ingest contract.
    ///
    /// Call after [`crate::normalize`]; the checks assume trimmed fields and
    /// an upper-cased severity. The first violation wins and the order is
    /// part of the API: clients see the same kind for the same input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure!(!self.id.is_empty(), EmptyIdSnafu);
        ensure!(!self.tenant_id.is_empty(), EmptyTenantIdSnafu);
        ensure!(
            self.timestamp.timestamp() != 0 || self.timestamp.timestamp_subsec_nanos() != 0,
            ZeroTimestampSnafu
        );
        ensure!(
            self.timestamp <= Utc::now() + Duration::seconds(MAX_CLOCK_SKEW_SECONDS),
            FutureTimestampSnafu
        );
        ensure!(
            Severity::parse(&self.severity).is_some(),
            InvalidSeveritySnafu {
                severity: self.severity.clone()
            }
        );
        ensure!(!self.source.is_empty(), EmptySourceSnafu);
        ensure!(!self.message.is_empty(), EmptyMessageSnafu);
        ensure!(
            self.message.len() <= MAX_MESSAGE_LENGTH,
            MessageTooLongSnafu {
                length: self.message.len()
            }
        );
        ensure!(
            self.metadata.len() <= MAX_METADATA_KEYS,
            TooManyMetadataSnafu {
                count: self.metadata.len()
            }
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_event() -> LogEvent {
        LogEvent {
            id: "evt-1".to_owned(),
            tenant_id: "tenant-1".to_owned(),
            timestamp: "2024-01-15T10:30:00Z".parse().unwrap(),
            severity: "INFO".to_owned(),
            source: "api-gateway".to_owned(),
            message: "request completed".to_owned(),
            metadata: BTreeMap::new(),
            trace_id: None,
            span_id: None,
        }
    }

    #[test]
    fn valid_event_passes() {
        valid_event().validate().expect("event should be valid");
    }

    #[test]
    fn empty_id_rejected() {
        let mut event = valid_event();
        event.id = String::new();
        assert_eq!(event.validate(), Err(ValidationError::EmptyId));
    }

    #[test]
    fn empty_tenant_rejected() {
        let mut event = valid_event();
        event.tenant_id = String::new();
        assert_eq!(event.validate(), Err(ValidationError::EmptyTenantId));
    }

    #[test]
    fn epoch_timestamp_rejected() {
        let mut event = valid_event();
        event.timestamp = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(event.validate(), Err(ValidationError::ZeroTimestamp));
    }

    #[test]
    fn future_timestamp_rejected() {
        let mut event = valid_event();
        event.timestamp = Utc::now() + Duration::minutes(5);
        assert_eq!(event.validate(), Err(ValidationError::FutureTimestamp));
    }

    #[test]
    fn near_future_timestamp_allowed() {
        let mut event = valid_event();
        event.timestamp = Utc::now() + Duration::seconds(30);
        assert_eq!(event.validate(), Ok(()));
    }

    #[test]
    fn invalid_severity_rejected() {
        let mut event = valid_event();
        event.severity = "LOUD".to_owned();
        assert!(matches!(
            event.validate(),
            Err(ValidationError::InvalidSeverity { .. })
        ));
    }

    #[test]
    fn lowercase_severity_rejected_without_normalization() {
        let mut event = valid_event();
        event.severity = "info".to_owned();
        assert!(event.validate().is_err());
    }

    #[test]
    fn empty_source_rejected() {
        let mut event = valid_event();
        event.source = String::new();
        assert_eq!(event.validate(), Err(ValidationError::EmptySource));
    }

    #[test]
    fn empty_message_rejected() {
        let mut event = valid_event();
        event.message = String::new();
        assert_eq!(event.validate(), Err(ValidationError::EmptyMessage));
    }

    #[test]
    fn oversized_message_rejected() {
        let mut event = valid_event();
        event.message = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            event.validate(),
            Err(ValidationError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn message_at_limit_allowed() {
        let mut event = valid_event();
        event.message = "x".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(event.validate(), Ok(()));
    }

    #[test]
    fn too_many_metadata_keys_rejected() {
        let mut event = valid_event();
        for i in 0..=MAX_METADATA_KEYS {
            event.metadata.insert(format!("key-{i}"), "value".to_owned());
        }
        assert!(matches!(
            event.validate(),
            Err(ValidationError::TooManyMetadata { .. })
        ));
    }

    #[test]
    fn violation_order_id_before_tenant() {
        // Both id and tenant are empty; the id violation must win.
        let mut event = valid_event();
        event.id = String::new();
        event.tenant_id = String::new();
        assert_eq!(event.validate(), Err(ValidationError::EmptyId));
    }

    #[test]
    fn severity_parse_roundtrip() {
        for name in ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"] {
            let severity = Severity::parse(name).unwrap();
            assert_eq!(severity.as_str(), name);
        }
        assert!(Severity::parse("TRACE").is_none());
        assert!(Severity::parse("info").is_none());
    }

    #[test]
    fn event_serializes_without_empty_optionals() {
        let event = valid_event();
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("metadata").is_none());
        assert!(json.get("trace_id").is_none());
        assert_eq!(json["severity"], "INFO");
        assert_eq!(json["timestamp"], "2024-01-15T10:30:00Z");
    }
}
