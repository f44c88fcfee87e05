use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::types::{HealthResponse, QueueStats, StatsResponse, WorkerStats};
use crate::ServerState;

/// Budget for the broker liveness probe behind `/health`.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn health_handler(State(state): State<ServerState>) -> Response {
    let ct = CancellationToken::new();
    let check = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, state.producer.health_check(&ct)).await;

    let error = match check {
        Ok(Ok(())) => {
            return (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "healthy",
                    timestamp: Utc::now().to_rfc3339(),
                    error: None,
                }),
            )
                .into_response();
        }
        Ok(Err(err)) => err.to_string(),
        Err(_) => "health check timed out".to_owned(),
    };

    tracing::warn!(error = %error, "health check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unhealthy",
            timestamp: Utc::now().to_rfc3339(),
            error: Some(error),
        }),
    )
        .into_response()
}

pub async fn stats_handler(State(state): State<ServerState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        worker: WorkerStats {
            processed: state.worker.processed.get(),
            failed: state.worker.failed.get(),
            active_workers: state.worker.active_workers.get(),
        },
        producer: state.producer.stats(),
        queue: QueueStats {
            buffered: state.queue.len(),
            capacity: state.queue.capacity(),
        },
    })
}

pub async fn metrics_handler(State(state): State<ServerState>) -> String {
    // The queue gauges are observational; refresh them at scrape time.
    state.metrics.queue_depth.set(state.queue.len() as i64);
    state
        .metrics
        .queue_capacity
        .set(state.queue.capacity() as i64);
    state.metrics.encode()
}
