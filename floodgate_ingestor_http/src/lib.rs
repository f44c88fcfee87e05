//! HTTP ingest server.
//!
//! Serves `POST /ingest`: parses single, wrapped, or array payloads,
//! normalizes and validates each event, and offers the resulting envelopes
//! to the queue without blocking. Requests authenticate with the
//! `X-API-Key` shared secret.

pub mod auth;
pub mod ingest;
pub mod middleware;
pub mod types;

pub use types::{ErrorResponse, IngestError, IngestResponse, LogEventInput};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use floodgate_core::metrics::IngestMetrics;
use floodgate_ingestor_core::EnvelopeQueue;

use crate::ingest::ingest_handler;

/// Default request body cap: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// HTTP ingestor that feeds accepted envelopes into the queue.
pub struct HttpIngestor {
    state: IngestState,
    max_body_bytes: usize,
}

#[derive(Clone)]
pub struct IngestState {
    pub(crate) queue: EnvelopeQueue,
    pub(crate) ingest_node: String,
    pub(crate) api_key: Arc<String>,
    pub(crate) metrics: IngestMetrics,
    batch_counter: Arc<AtomicU64>,
}

impl IngestState {
    /// Batch ids are `{node}-{unix_nanos}-{counter}`: unique per process and
    /// traceable back to the ingest node.
    pub(crate) fn next_batch_id(&self) -> String {
        let counter = self.batch_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{}-{}-{}", self.ingest_node, nanos, counter)
    }
}

impl HttpIngestor {
    pub fn new(
        queue: EnvelopeQueue,
        ingest_node: impl Into<String>,
        api_key: impl Into<String>,
        metrics: IngestMetrics,
        max_body_bytes: usize,
    ) -> Self {
        let state = IngestState {
            queue,
            ingest_node: ingest_node.into(),
            api_key: Arc::new(api_key.into()),
            metrics,
            batch_counter: Arc::new(AtomicU64::new(0)),
        };
        Self {
            state,
            max_body_bytes,
        }
    }

    pub fn into_router(self) -> Router {
        let http_requests = self.state.metrics.http_requests.clone();
        let panics = self.state.metrics.panics_recovered.clone();

        Router::new()
            .route("/ingest", post(ingest_handler))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_api_key,
            ))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(self.state)
            .layer(axum::middleware::from_fn_with_state(
                http_requests,
                middleware::log_requests,
            ))
            .layer(axum::middleware::from_fn_with_state(
                panics,
                middleware::recover_panics,
            ))
    }
}
