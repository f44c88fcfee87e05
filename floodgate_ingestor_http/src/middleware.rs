//! Request logging and panic recovery.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use floodgate_core::metrics::{ComponentLabels, HttpLabels};
use futures::FutureExt;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use uuid::Uuid;

use crate::types::ErrorResponse;

/// Log every request with a request id, status, and latency, and count it.
pub async fn log_requests(
    State(http_requests): State<Family<HttpLabels, Counter>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_owned();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    http_requests
        .get_or_create(&HttpLabels {
            method: method.clone(),
            endpoint: path.clone(),
            status,
        })
        .inc();

    if status >= 400 {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            elapsed_ms,
            "request completed with error"
        );
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            elapsed_ms,
            "request completed"
        );
    }

    response
}

/// Convert a panicking handler into a 500 without taking the process down.
pub async fn recover_panics(
    State(panics): State<Family<ComponentLabels, Counter>>,
    request: Request,
    next: Next,
) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            panics.get_or_create(&ComponentLabels::http_handler()).inc();
            let message = panic
                .downcast_ref::<&'static str>()
                .copied()
                .map(ToOwned::to_owned)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_owned());
            tracing::error!(panic = %message, "panic recovered in HTTP handler");

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal server error".to_owned(),
                    kind: None,
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use tower::util::ServiceExt;

    use super::*;

    async fn panicking_handler() -> &'static str {
        panic!("handler exploded");
    }

    #[tokio::test]
    async fn panics_become_500s() {
        let panics = Family::<ComponentLabels, Counter>::default();
        let app = Router::new()
            .route("/boom", get(panicking_handler))
            .layer(axum::middleware::from_fn_with_state(
                panics.clone(),
                recover_panics,
            ));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            panics
                .get_or_create(&ComponentLabels::http_handler())
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn requests_are_counted_by_status() {
        let http_requests = Family::<HttpLabels, Counter>::default();
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                http_requests.clone(),
                log_requests,
            ));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/ok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let count = http_requests
            .get_or_create(&HttpLabels {
                method: "GET".to_owned(),
                endpoint: "/ok".to_owned(),
                status: 200,
            })
            .get();
        assert_eq!(count, 1);
    }
}
