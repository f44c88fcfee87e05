//! The `/ingest` handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use floodgate_core::{normalize, parse_timestamp, Envelope, LogEvent, ValidationError};
use floodgate_ingestor_core::OfferOutcome;

use crate::types::{ErrorResponse, IngestError, IngestRequest, IngestResponse, LogEventInput};
use crate::IngestState;

pub async fn ingest_handler(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let is_json = content_type
            .to_str()
            .map(|value| value.trim().to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "content-type must be application/json",
                None,
            );
        }
    }

    let inputs = match parse_body(&body) {
        Some(inputs) => inputs,
        None => {
            tracing::debug!(body_size = body.len(), "unparseable ingest body");
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid JSON: expected an event object or an array of events",
                Some("BadJson"),
            );
        }
    };

    let batch_id = state.next_batch_id();
    let mut response = IngestResponse {
        accepted: 0,
        rejected: 0,
        errors: Vec::new(),
        batch_id: batch_id.clone(),
    };

    for (index, input) in inputs.into_iter().enumerate() {
        process_event(&state, &batch_id, index, input, &mut response);
    }

    tracing::debug!(
        batch_id = %response.batch_id,
        accepted = response.accepted,
        rejected = response.rejected,
        "ingest request processed"
    );

    let status = if response.accepted == 0 && response.rejected > 0 {
        StatusCode::BAD_REQUEST
    } else if response.rejected > 0 {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    (status, Json(response)).into_response()
}

/// Accepted body shapes, first parse wins: an object wrapper with `event`
/// or `events`, a bare array, or a bare event object carrying an id.
fn parse_body(body: &[u8]) -> Option<Vec<LogEventInput>> {
    if let Ok(request) = serde_json::from_slice::<IngestRequest>(body) {
        if !request.events.is_empty() {
            return Some(request.events);
        }
        if let Some(event) = request.event {
            return Some(vec![event]);
        }
    }

    if let Ok(events) = serde_json::from_slice::<Vec<LogEventInput>>(body) {
        if !events.is_empty() {
            return Some(events);
        }
    }

    if let Ok(single) = serde_json::from_slice::<LogEventInput>(body) {
        if !single.id.trim().is_empty() {
            return Some(vec![single]);
        }
    }

    None
}

fn process_event(
    state: &IngestState,
    batch_id: &str,
    index: usize,
    input: LogEventInput,
    response: &mut IngestResponse,
) {
    let reported_id = {
        let trimmed = input.id.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_owned())
    };

    let timestamp = match parse_timestamp(&input.timestamp) {
        Ok(timestamp) => timestamp,
        Err(err) => {
            reject(state, response, index, reported_id, &err);
            return;
        }
    };

    let mut event = LogEvent {
        id: input.id,
        tenant_id: input.tenant_id,
        timestamp,
        severity: input.severity,
        source: input.source,
        message: input.message,
        metadata: input.metadata,
        trace_id: input.trace_id,
        span_id: input.span_id,
    };
    normalize(&mut event);

    if let Err(err) = event.validate() {
        tracing::debug!(
            index,
            event_id = %event.id,
            tenant_id = %event.tenant_id,
            error = %err,
            "event failed validation"
        );
        reject(state, response, index, reported_id, &err);
        return;
    }

    let envelope = Envelope::new(event, state.ingest_node.clone()).with_batch(batch_id, index);
    match state.queue.offer(envelope) {
        OfferOutcome::Accepted => {
            response.accepted += 1;
            state.metrics.record_acceptance();
        }
        OfferOutcome::Full | OfferOutcome::Closed => {
            tracing::warn!(index, "queue full, rejecting event");
            response.rejected += 1;
            response.errors.push(IngestError {
                index,
                event_id: reported_id,
                kind: "QueueFull".to_owned(),
                detail: "internal queue full, try again later".to_owned(),
            });
            state.metrics.record_rejection("QueueFull");
        }
    }
}

fn reject(
    state: &IngestState,
    response: &mut IngestResponse,
    index: usize,
    event_id: Option<String>,
    err: &ValidationError,
) {
    response.rejected += 1;
    response.errors.push(IngestError {
        index,
        event_id,
        kind: err.kind().to_owned(),
        detail: err.to_string(),
    });
    state.metrics.record_rejection(err.kind());
}

pub(crate) fn error_response(
    status: StatusCode,
    message: &str,
    kind: Option<&str>,
) -> Response {
    let body = ErrorResponse {
        error: message.to_owned(),
        kind: kind.map(ToOwned::to_owned),
    };
    (status, Json(body)).into_response()
}
