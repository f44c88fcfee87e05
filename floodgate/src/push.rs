use clap::Args;
use floodgate_ingestor_http::LogEventInput;
use floodgate_push_client::PushClient;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::error::{InvalidPayloadSnafu, PayloadFileSnafu, PushSnafu, Result};

#[derive(Debug, Args)]
pub struct PushArgs {
    /// Base URL of the Floodgate server.
    #[arg(long, env = "FLOODGATE_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// API key for the X-API-Key header.
    #[arg(long, env = "API_KEY")]
    api_key: String,

    /// Events as JSON: an object, an array, or @file containing either.
    payload: String,
}

impl PushArgs {
    pub async fn run(self, _ct: CancellationToken) -> Result<()> {
        let events = self.parse_payload()?;
        let count = events.len();

        let client = PushClient::new(&self.url, &self.api_key);
        let response = client.send(&events).await.context(PushSnafu)?;

        println!(
            "batch {}: accepted {} / rejected {} of {count}",
            response.batch_id, response.accepted, response.rejected
        );
        for error in &response.errors {
            match &error.event_id {
                Some(event_id) => {
                    println!("  [{}] {} ({}): {}", error.index, event_id, error.kind, error.detail)
                }
                None => println!("  [{}] ({}): {}", error.index, error.kind, error.detail),
            }
        }

        Ok(())
    }

    fn parse_payload(&self) -> Result<Vec<LogEventInput>> {
        let raw = if let Some(path) = self.payload.strip_prefix('@') {
            std::fs::read_to_string(path).context(PayloadFileSnafu {
                path: path.to_owned(),
            })?
        } else {
            self.payload.clone()
        };

        if let Ok(events) = serde_json::from_str::<Vec<LogEventInput>>(&raw) {
            if events.is_empty() {
                return InvalidPayloadSnafu {
                    message: "event array is empty".to_owned(),
                }
                .fail();
            }
            return Ok(events);
        }

        if let Ok(event) = serde_json::from_str::<LogEventInput>(&raw) {
            return Ok(vec![event]);
        }

        InvalidPayloadSnafu {
            message: "expected a JSON event object or array of events".to_owned(),
        }
        .fail()
    }
}
