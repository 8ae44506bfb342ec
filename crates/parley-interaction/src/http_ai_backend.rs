//! HttpAiBackend - JSON-over-HTTP implementation of [`AiBackend`].
//!
//! The endpoint receives
//!
//! ```json
//! {"sender_id": "...", "message_text": "...",
//!  "conversation_history": [{"message": "...", "is_from_user": true, "timestamp": "..."}]}
//! ```
//!
//! and answers with a JSON object carrying the reply in `reply`, `response`
//! or `text` (first one present wins).

use async_trait::async_trait;
use parley_core::backend::{AiBackend, AiCallError};
use parley_core::config::AiConfig;
use parley_core::conversation::{CorrespondentId, HistoryEntry};
use parley_core::error::{ParleyError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 200;

/// AI backend that POSTs each conversation turn to a single HTTP endpoint.
#[derive(Clone)]
pub struct HttpAiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    sender_id: &'a str,
    message_text: &'a str,
    conversation_history: Vec<HistoryItem<'a>>,
}

#[derive(Debug, Serialize)]
struct HistoryItem<'a> {
    message: &'a str,
    is_from_user: bool,
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    reply: Option<String>,
    response: Option<String>,
    text: Option<String>,
}

impl HttpAiBackend {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let defaults = AiConfig::default();
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_retries: defaults.max_retries,
            retry_base_delay: Duration::from_millis(defaults.retry_base_delay_ms),
        }
    }

    /// Builds a backend from `[ai]` settings; endpoint and key are required.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        config.validate()?;
        let (Some(endpoint), Some(api_key)) = (&config.endpoint, &config.api_key) else {
            return Err(ParleyError::config("ai.endpoint and ai.api_key are required"));
        };

        Ok(Self::new(endpoint, api_key)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retries(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ))
    }

    /// Uses a preconfigured HTTP client (proxy, TLS settings).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the total number of attempts (at least 1) and the base of the
    /// exponential backoff between them.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    async fn send_request(&self, body: &ChatRequest<'_>) -> std::result::Result<String, AiCallError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| AiCallError::MalformedResponse(err.to_string()))?;

        extract_reply(parsed)
    }
}

#[async_trait]
impl AiBackend for HttpAiBackend {
    async fn call(
        &self,
        sender: &CorrespondentId,
        latest_text: &str,
        context: &[HistoryEntry],
    ) -> std::result::Result<String, AiCallError> {
        let body = build_request(sender, latest_text, context);

        let mut attempt = 0;
        loop {
            tracing::debug!(
                sender = %sender,
                attempt = attempt + 1,
                max_attempts = self.max_retries,
                "Sending request to AI backend"
            );

            match self.send_request(&body).await {
                Ok(reply) => {
                    tracing::info!(sender = %sender, "Received AI response");
                    return Ok(reply);
                }
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    let delay = backoff_delay(self.retry_base_delay, attempt);
                    tracing::warn!(
                        sender = %sender,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "AI request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(sender = %sender, error = %err, "AI request failed");
                    return Err(err);
                }
            }
        }
    }
}

fn build_request<'a>(
    sender: &'a CorrespondentId,
    latest_text: &'a str,
    context: &'a [HistoryEntry],
) -> ChatRequest<'a> {
    ChatRequest {
        sender_id: sender.as_str(),
        message_text: latest_text,
        conversation_history: context
            .iter()
            .map(|entry| HistoryItem {
                message: &entry.text,
                is_from_user: entry.is_from_user(),
                timestamp: entry.timestamp.to_rfc3339(),
            })
            .collect(),
    }
}

fn extract_reply(response: ChatResponse) -> std::result::Result<String, AiCallError> {
    let reply = response
        .reply
        .or(response.response)
        .or(response.text)
        .ok_or_else(|| {
            AiCallError::MalformedResponse("response has no reply, response or text field".into())
        })?;

    if reply.trim().is_empty() {
        return Err(AiCallError::EmptyReply);
    }
    Ok(reply)
}

fn map_transport_error(err: reqwest::Error) -> AiCallError {
    if err.is_timeout() {
        AiCallError::Timeout
    } else {
        AiCallError::Transport(err.to_string())
    }
}

fn map_http_error(status: StatusCode, body: &str) -> AiCallError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error").unwrap_or(&value);
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(ERROR_BODY_LIMIT).collect());

    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;

    AiCallError::Http {
        status: status.as_u16(),
        message,
        retryable,
    }
}

/// `base * 2^attempt`, with `attempt` counted from 0.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
