use reqwest::header::ACCEPT;
use reqwest::Client;

use crate::models::generation::{GenerationPayload, SubmitResponse};

/// Client for the short-generation webhook.
pub struct GenerationClient {
    http: Client,
    webhook_url: String,
}

impl GenerationClient {
    /// `webhook_url` is the full URL (API base plus webhook path).
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }

    pub fn with_client(http: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Submit a generation job.
    ///
    /// Image jobs normally answer with an inline result array; video jobs
    /// answer with an acknowledgement and report progress through the status
    /// store under their `task_uuid`.
    pub async fn submit(&self, payload: &GenerationPayload) -> Result<SubmitResponse, GenerationError> {
        payload.check().map_err(GenerationError::InvalidPayload)?;

        metrics::counter!(
            "generation_requests_total",
            "generation_type" => payload.generation_type.to_string()
        )
        .increment(1);
        tracing::info!(
            url = %self.webhook_url,
            generation_type = %payload.generation_type,
            task_uuid = ?payload.task_uuid,
            user_id = %payload.user_id,
            "Submitting generation job"
        );

        let response = self
            .http
            .post(&self.webhook_url)
            .header(ACCEPT, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    GenerationError::Unreachable(e)
                } else {
                    GenerationError::Http(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(GenerationError::Http)?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "Generation webhook rejected job");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = status.as_u16(), body_len = body.len(), "Generation webhook answered");
        Ok(SubmitResponse::from_body(&body))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid generation payload: {0}")]
    InvalidPayload(String),

    #[error("Could not reach the generation service: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation service error ({status}): {body}")]
    Api { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generation::GenerationOptions;

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_sending() {
        // Nothing listens here; the payload check must fail first.
        let client = GenerationClient::new("http://127.0.0.1:9/webhook");
        let payload = GenerationPayload::image("", "aGVsbG8=".to_string(), "a.png", GenerationOptions::default());

        let err = client.submit(&payload).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidPayload(_)));
    }
}
