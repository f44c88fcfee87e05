use snafu::Snafu;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("invalid configuration: {message}"))]
    InvalidConfiguration { message: String },
    #[snafu(display("failed to initialize logging"))]
    Observability {
        source: floodgate_observability::ObservabilityError,
    },
    #[snafu(display("failed to initialize producer"))]
    Producer {
        source: floodgate_producer::ProducerError,
    },
    #[snafu(display("failed to bind {address}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[snafu(display("server error"))]
    Server { source: std::io::Error },
    #[snafu(display("push failed"))]
    Push {
        source: floodgate_push_client::PushClientError,
    },
    #[snafu(display("invalid payload: {message}"))]
    InvalidPayload { message: String },
    #[snafu(display("failed to read payload file {path}"))]
    PayloadFile {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
