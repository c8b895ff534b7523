use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use shared::agent_api::ChatMessage;
use shared::settings::MentorSettings;
use shared::StreamError;
use std::sync::LazyLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::driver::{DriverOptions, StreamConsumer, StreamDriver, StreamOutcome};

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct MentorRequest<'a> {
    messages: &'a [ChatMessage],
}

/// Map the initial HTTP status to a terminal error, if it is not a
/// streamable success.
pub fn classify_status(status: StatusCode) -> Option<StreamError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Some(StreamError::RateLimited),
        StatusCode::PAYMENT_REQUIRED => Some(StreamError::QuotaExceeded),
        StatusCode::NO_CONTENT => Some(StreamError::TransportFailure(
            "response has no body".into(),
        )),
        s if !s.is_success() => Some(StreamError::TransportFailure(format!(
            "unexpected status {}",
            s
        ))),
        _ => None,
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for the streaming mentor chat endpoint.
pub struct MentorClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    options: DriverOptions,
}

impl MentorClient {
    pub fn from_settings(settings: &MentorSettings) -> Result<Self> {
        let endpoint = settings.endpoint_url();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| anyhow!("invalid mentor endpoint {}: {}", endpoint, e))?;

        Ok(Self {
            http: SHARED_HTTP.clone(),
            endpoint,
            api_key: settings.api_key.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
            options: DriverOptions::from(settings),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the transcript and stream the assistant reply into `consumer`.
    ///
    /// Every outcome, including request and status failures, is reported to
    /// the consumer and returned; nothing is retried.
    pub async fn stream_reply<C: StreamConsumer>(
        &self,
        messages: &[ChatMessage],
        consumer: &mut C,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let mut driver = StreamDriver::new(self.options);

        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&MentorRequest { messages });
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        tracing::debug!(endpoint = %self.endpoint, messages = messages.len(), "sending chat request");
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return driver.cancel(consumer),
            resp = tokio::time::timeout(self.timeout, req.send()) => resp,
        };
        let resp = match resp {
            Ok(Ok(resp)) => resp,
            Err(_) => {
                return driver.fail(
                    StreamError::TransportFailure(format!(
                        "no response within {:?}",
                        self.timeout
                    )),
                    consumer,
                )
            }
            Ok(Err(e)) => {
                return driver.fail(
                    StreamError::TransportFailure(format!("request failed: {}", e)),
                    consumer,
                )
            }
        };

        if let Some(error) = classify_status(resp.status()) {
            let body = resp.text().await.unwrap_or_default();
            let detail: String = body.chars().take(800).collect();
            if !detail.trim().is_empty() {
                tracing::warn!(detail = %detail, "mentor endpoint rejected request");
            }
            return driver.fail(error, consumer);
        }

        driver.run(resp.bytes_stream(), consumer, cancel).await
    }
}
