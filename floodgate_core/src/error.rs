use snafu::Snafu;

use crate::event::{MAX_MESSAGE_LENGTH, MAX_METADATA_KEYS};

/// Per-event validation failures.
///
/// The display message is forwarded verbatim to clients in the ingest
/// response, so it should describe the problem in terms of the submitted
/// event, not internal state.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("log event id cannot be empty"))]
    EmptyId,
    #[snafu(display("tenant id cannot be empty"))]
    EmptyTenantId,
    #[snafu(display("timestamp cannot be zero"))]
    ZeroTimestamp,
    #[snafu(display("timestamp cannot be in the future"))]
    FutureTimestamp,
    #[snafu(display("invalid timestamp format"))]
    InvalidTimestamp,
    #[snafu(display("invalid severity level: {severity}"))]
    InvalidSeverity { severity: String },
    #[snafu(display("source cannot be empty"))]
    EmptySource,
    #[snafu(display("message cannot be empty"))]
    EmptyMessage,
    #[snafu(display("message exceeds maximum length of {MAX_MESSAGE_LENGTH} bytes"))]
    MessageTooLong { length: usize },
    #[snafu(display("metadata exceeds maximum of {MAX_METADATA_KEYS} keys"))]
    TooManyMetadata { count: usize },
}

impl ValidationError {
    /// Stable machine-readable kind, surfaced in ingest response errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyId => "EmptyId",
            Self::EmptyTenantId => "EmptyTenantId",
            Self::ZeroTimestamp => "ZeroTimestamp",
            Self::FutureTimestamp => "FutureTimestamp",
            Self::InvalidTimestamp => "InvalidTimestamp",
            Self::InvalidSeverity { .. } => "InvalidSeverity",
            Self::EmptySource => "EmptySource",
            Self::EmptyMessage => "EmptyMessage",
            Self::MessageTooLong { .. } => "MessageTooLong",
            Self::TooManyMetadata { .. } => "TooManyMetadata",
        }
    }
}
