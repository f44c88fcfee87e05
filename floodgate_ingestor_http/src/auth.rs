//! Shared-secret authentication middleware.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::ingest::error_response;
use crate::IngestState;

/// Require a valid `X-API-Key` header on every request.
pub async fn require_api_key(
    State(state): State<IngestState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() {
        tracing::warn!(path = request.uri().path(), "missing API key");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "missing X-API-Key header",
            None,
        );
    }

    if !keys_match(provided, &state.api_key) {
        tracing::warn!(path = request.uri().path(), "invalid API key");
        return error_response(StatusCode::UNAUTHORIZED, "invalid API key", None);
    }

    next.run(request).await
}

/// Constant-time comparison; only the key length can leak.
fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_keys_pass() {
        assert!(keys_match("secret-key", "secret-key"));
    }

    #[test]
    fn mismatched_keys_fail() {
        assert!(!keys_match("secret-kez", "secret-key"));
        assert!(!keys_match("secret", "secret-key"));
        assert!(!keys_match("", "secret-key"));
    }
}
