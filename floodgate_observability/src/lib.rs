//! Logging initialization.
//!
//! Structured logs go to stdout, human-readable by default and JSON when
//! `RUST_LOG_FORMAT=json`. The filter comes from `RUST_LOG` when set,
//! otherwise from the level passed in (the `LOG_LEVEL` configuration).

use snafu::Snafu;
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("a global tracing subscriber is already installed"))]
    AlreadyInstalled,
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_observability(default_level: &str) -> Result<(), ObservabilityError> {
    tracing_subscriber::registry()
        .with(stdout(default_level))
        .try_init()
        .map_err(|_| ObservabilityError::AlreadyInstalled)
}

fn stdout<S>(default_level: &str) -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_owned()));

    let json_format = std::env::var("RUST_LOG_FORMAT")
        .map(|value| value == "json")
        .unwrap_or(false);

    if json_format {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed()
    }
}
