//! HTTP client for pushing events to a Floodgate server.

use floodgate_ingestor_http::{ErrorResponse, IngestResponse, LogEventInput};
use reqwest::StatusCode;
use snafu::{ResultExt, Snafu};

/// A client for the `/ingest` endpoint.
#[derive(Debug, Clone)]
pub struct PushClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Snafu)]
pub enum PushClientError {
    #[snafu(display("request error"))]
    Request { source: reqwest::Error },
    #[snafu(display("server rejected the request: status={status}, message={message}"))]
    Rejected { status: StatusCode, message: String },
}

pub type Result<T, E = PushClientError> = std::result::Result<T, E>;

impl PushClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Send a batch of events.
    ///
    /// Both full success (200) and partial acceptance (207) return the
    /// ingest response; per-event rejections are in its `errors`.
    pub async fn send(&self, events: &[LogEventInput]) -> Result<IngestResponse> {
        let url = format!("{}/ingest", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "events": events }))
            .send()
            .await
            .context(RequestSnafu)?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<IngestResponse>()
                .await
                .context(RequestSnafu);
        }

        // Whole-batch rejections (400) still carry per-event errors; other
        // statuses carry an ErrorResponse.
        if status == StatusCode::BAD_REQUEST {
            if let Ok(ingest) = response.json::<IngestResponse>().await {
                return Ok(ingest);
            }
            return Err(PushClientError::Rejected {
                status,
                message: "invalid request".to_owned(),
            });
        }

        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|err| err.to_string());
        Err(PushClientError::Rejected { status, message })
    }
}
