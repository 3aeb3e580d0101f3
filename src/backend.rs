//! Model backends: the seam between the extraction loop and inference.
//!
//! The extraction pipeline only ever sees [`ModelBackend`] — a single
//! `complete` call from instruction to completion text. The production
//! implementation is [`OllamaBackend`], a thin HTTP client for a locally
//! hosted Ollama server. Tests inject scripted backends through
//! [`crate::config::ExtractionConfig::backend`] so the retry and validation
//! logic can be exercised without a running model.
//!
//! Every transport-level failure (connection refused, timeout, non-2xx
//! status, unreadable body) maps to [`ItemError::InferenceUnavailable`],
//! which the retry loop treats as retryable. Rate limiting by the endpoint
//! is handled the same way — per item, with backoff — never by serialising
//! the whole batch.

use crate::error::{ItemError, SheetError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One inference request: a system instruction, the sheet text, and
/// generation parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Interface to a text-completion model.
///
/// Implementations must be `Send + Sync`: batch items call the same backend
/// concurrently.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one completion. Each call is one billable/costly model
    /// invocation — callers count and cap these.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ItemError>;
}

// ── Ollama ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    /// Constrains generation to syntactically valid JSON. The model can
    /// still return the wrong shape, so parsing stays defensive.
    format: &'static str,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP client for the Ollama `/api/chat` endpoint.
pub struct OllamaBackend {
    client: reqwest::Client,
    chat_url: String,
    model: String,
}

impl OllamaBackend {
    /// Build a backend for `endpoint` (base URL, e.g. `http://localhost:11434`).
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, SheetError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SheetError::BackendInit {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            chat_url: format!("{}/api/chat", endpoint.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ItemError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request to {} timed out", self.chat_url)
                } else {
                    format!("request to {} failed: {e}", self.chat_url)
                };
                ItemError::InferenceUnavailable { reason }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ItemError::InferenceUnavailable {
                reason: format!("{} answered HTTP {status}: {body}", self.chat_url),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ItemError::InferenceUnavailable {
                    reason: format!("malformed response from {}: {e}", self.chat_url),
                })?;

        debug!(
            model = %self.model,
            chars = parsed.message.content.len(),
            "completion received"
        );
        Ok(parsed.message.content)
    }
}

// ── Test support ─────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_strips_trailing_slash() {
        let backend = OllamaBackend::new(
            "http://localhost:11434/",
            "llama3.1:latest",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(backend.chat_url, "http://localhost:11434/api/chat");
    }

    #[test]
    fn chat_request_serialises_expected_shape() {
        let body = ChatRequest {
            model: "llama3.1:latest",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: 0.1,
                num_predict: 4096,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
