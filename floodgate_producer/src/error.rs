use std::time::Duration;

use snafu::Snafu;

/// Errors surfaced by a [`crate::BrokerClient`] implementation.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum BrokerError {
    #[snafu(display("broker transport error: {message}"))]
    Transport { message: String },
    #[snafu(display("broker write timed out after {timeout:?}"))]
    WriteTimeout { timeout: Duration },
    #[snafu(display("broker client is closed"))]
    ClientClosed,
}

/// Errors surfaced by [`crate::LogProducer`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProducerError {
    /// The producer was closed; no further publishes are possible.
    #[snafu(display("producer is closed"))]
    Closed,
    /// The caller cancelled the operation; never retried.
    #[snafu(display("publish cancelled"))]
    Cancelled,
    #[snafu(display("failed to serialize envelope {event_id}"))]
    Serialize {
        event_id: String,
        source: serde_json::Error,
    },
    #[snafu(display("publish failed after {attempts} attempts"))]
    PublishFailed { attempts: u32, source: BrokerError },
    #[snafu(display("broker health check failed"))]
    Unhealthy { source: BrokerError },
    #[snafu(display("failed to create broker client"))]
    CreateClient { source: BrokerError },
    #[snafu(display("invalid producer configuration: {message}"))]
    InvalidConfig { message: String },
}

pub type Result<T, E = ProducerError> = std::result::Result<T, E>;
