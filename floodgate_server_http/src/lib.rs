//! Operational HTTP surface: health, stats, and metrics.

pub mod routes;
pub mod types;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use floodgate_core::metrics::{Metrics, WorkerMetrics};
use floodgate_ingestor_core::EnvelopeQueue;
use floodgate_producer::LogProducer;

use crate::routes::{health_handler, metrics_handler, stats_handler};

/// Server for the unauthenticated operational endpoints.
pub struct HttpServer {
    state: ServerState,
}

#[derive(Clone)]
pub struct ServerState {
    pub(crate) producer: Arc<LogProducer>,
    pub(crate) queue: EnvelopeQueue,
    pub(crate) worker: WorkerMetrics,
    pub(crate) metrics: Arc<Metrics>,
}

impl HttpServer {
    pub fn new(
        producer: Arc<LogProducer>,
        queue: EnvelopeQueue,
        worker: WorkerMetrics,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            state: ServerState {
                producer,
                queue,
                worker,
                metrics,
            },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/stats", get(stats_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state)
    }
}
