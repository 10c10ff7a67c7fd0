//! Webhook relay: forwards each committed record and roster change to an
//! external spreadsheet endpoint.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use trainfeed_core::statistics::overall_average;
use trainfeed_core::{
    FeedbackEvent, FeedbackRecord, InstructorEntry, Metadata, OpenEnded, Ratings, RecordId,
};

use crate::error::SinkError;
use crate::sink::{Delivery, RecordSink};

/// Longest response body kept in a rejection message.
const MAX_ERROR_BODY: usize = 200;

/// POSTs one JSON document per event. No retries.
pub struct WebhookRelay {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl WebhookRelay {
    pub fn new(endpoint: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout_secs,
            client,
        })
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RelayPayload<'a> {
    #[serde(rename_all = "camelCase")]
    Record {
        id: &'a RecordId,
        created_at: DateTime<Utc>,
        metadata: &'a Metadata,
        ratings: &'a Ratings,
        average: f64,
        open_ended: &'a OpenEnded,
    },
    Roster {
        instructors: &'a [InstructorEntry],
    },
}

impl<'a> RelayPayload<'a> {
    fn record(record: &'a FeedbackRecord) -> Self {
        RelayPayload::Record {
            id: record.id(),
            created_at: record.created_at(),
            metadata: record.metadata(),
            ratings: record.ratings(),
            average: overall_average(record.ratings()),
            open_ended: record.open_ended(),
        }
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[async_trait]
impl RecordSink for WebhookRelay {
    fn name(&self) -> &str {
        "relay"
    }

    #[instrument(skip(self, event), fields(kind = event.kind()))]
    async fn handle(&self, event: &FeedbackEvent) -> Result<Delivery, SinkError> {
        let payload = match event {
            FeedbackEvent::RecordSaved { record, .. } => RelayPayload::record(record),
            FeedbackEvent::RosterChanged { roster } => RelayPayload::Roster {
                instructors: roster.as_slice(),
            },
        };
        let body = serde_json::to_vec(&payload)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout_secs)
                } else {
                    SinkError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message: truncate(&text),
            });
        }

        tracing::debug!(status = status.as_u16(), "relay accepted");
        Ok(Delivery::Delivered)
    }
}
