use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use retrova_core::{ChatMessage, RetrovaError, RetrovaResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::retry::RetryPolicy;

/// Connect timeout for the completions endpoint. The response body is a
/// stream of unbounded duration, so only connection establishment is capped.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Sampling temperature used for retrieval-grounded answering.
const TEMPERATURE: f32 = 0.2;

/// A chat-completion request: one new user message on top of a system
/// prompt and prior history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The new user message.
    pub message: String,
    /// Model identifier understood by the backend.
    pub model: String,
    /// The system prompt.
    pub system_prompt: String,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatMessage>,
}

/// Events emitted while a completion streams.
///
/// The sequence is finite and terminated by [`Done`](CompletionEvent::Done);
/// it is not restartable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionEvent {
    /// A chunk of answer text.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// Token usage reported by the backend, when it sends one.
    Usage {
        /// Raw usage object.
        usage: serde_json::Value,
    },
    /// The stream finished.
    Done,
    /// The stream broke mid-flight.
    Error {
        /// Description of the failure.
        message: String,
    },
}

/// Trait for streaming chat-completion backends.
///
/// `chat_stream` returns a channel of [`CompletionEvent`]s for incremental
/// consumption plus a join handle resolving to the fully assembled answer
/// text once the stream ends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Starts a completion stream for the request.
    async fn chat_stream(
        &self,
        request: &CompletionRequest,
    ) -> RetrovaResult<(mpsc::Receiver<CompletionEvent>, JoinHandle<RetrovaResult<String>>)>;
}

/// SSE streaming client for an OpenAI-compatible `/v1/chat/completions`
/// endpoint.
///
/// Connect-time failures are retried per the policy (one retry by default);
/// a broken stream after connection is terminal and surfaces as
/// [`Completion`](RetrovaError::Completion).
pub struct OpenAiCompletion {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl OpenAiCompletion {
    /// Creates a client against the given base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> RetrovaResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RetrovaError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            policy: RetryPolicy::single_retry(),
        })
    }

    /// Overrides the retry policy. Chainable.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn build_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(request.system_prompt.clone()));
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(request.message.clone()));
        messages
    }

    async fn connect(&self, request: &CompletionRequest) -> RetrovaResult<reqwest::Response> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": Self::build_messages(request),
            "stream": true,
            "temperature": TEMPERATURE,
        });
        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrovaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(RetrovaError::Http(format!(
                "completions endpoint returned {status}: {text}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn chat_stream(
        &self,
        request: &CompletionRequest,
    ) -> RetrovaResult<(mpsc::Receiver<CompletionEvent>, JoinHandle<RetrovaResult<String>>)>
    {
        let mut last_err = None;
        let mut resp = None;
        for attempt in 0..=self.policy.max_retries {
            match self.connect(request).await {
                Ok(r) => {
                    resp = Some(r);
                    break;
                }
                Err(e) => {
                    if attempt < self.policy.max_retries {
                        warn!(attempt, error = %e, "completion connect failed, backing off");
                        self.policy.backoff(attempt).await;
                    }
                    last_err = Some(e);
                }
            }
        }
        let Some(resp) = resp else {
            return Err(RetrovaError::Completion(
                last_err.map_or_else(|| "exhausted retries".to_string(), |e| e.to_string()),
            ));
        };

        let (tx, rx) = mpsc::channel::<CompletionEvent>(256);
        let mut byte_stream = resp.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut full_text = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let message = format!("stream read error: {e}");
                        let _ = tx.send(CompletionEvent::Error { message: message.clone() }).await;
                        return Err(RetrovaError::Completion(message));
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        let _ = tx.send(CompletionEvent::Done).await;
                        continue;
                    }

                    // The backend occasionally emits malformed chunks;
                    // they are logged and skipped, not fatal.
                    let event: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => {
                            warn!(chunk = %data, "skipping malformed streaming chunk");
                            continue;
                        }
                    };

                    let choices = event["choices"].as_array();
                    if choices.map_or(true, |c| c.is_empty()) {
                        // Usage-only chunk at the end of the stream.
                        if let Some(usage) = event.get("usage") {
                            let _ = tx.send(CompletionEvent::Usage { usage: usage.clone() }).await;
                        }
                        continue;
                    }
                    if let Some(content) = event["choices"][0]["delta"]["content"].as_str() {
                        if !content.is_empty() {
                            full_text.push_str(content);
                            let _ = tx
                                .send(CompletionEvent::TextDelta { text: content.to_string() })
                                .await;
                        }
                    }
                }
            }

            Ok(full_text)
        });

        Ok((rx, handle))
    }
}
