//! OpenAI-compatible completion provider client.
//!
//! Local model servers (ollama, LM Studio, koboldcpp, jan, gpt4all) all
//! speak the OpenAI chat-completions dialect at `<base>/v1/chat/completions`.
//! [`OpenAiClient`] talks to one of them directly; the
//! [`CompletionProvider`] trait is the seam the session loop and the
//! summarizer program against, so the CLI can substitute a daemon-backed
//! implementation and tests can substitute a mock.

pub mod models;
pub mod streaming;

use crate::config::HermitConfig;
use crate::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::debug;

/// Boxed future returned by [`CompletionProvider`] methods.
///
/// Type alias to keep trait signatures and implementations readable.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// A completion capability: one-shot and streaming.
///
/// Both methods resolve to the full response text. `stream_complete`
/// additionally invokes `on_chunk` for each text fragment in arrival order;
/// concatenating the fragments reconstructs the returned text. An `Err`
/// means the provider produced nothing usable (connection failure, bad
/// status) — mid-stream degradation is the implementation's business and is
/// surfaced in-band as text.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(&'a self, turns: &'a [Turn]) -> ProviderFuture<'a>;

    fn stream_complete<'a>(
        &'a self,
        turns: &'a [Turn],
        on_chunk: &'a mut (dyn FnMut(&str) + Send),
    ) -> ProviderFuture<'a>;
}

// ── Wire types ─────────────────────────────────────────────────────

/// Chat completion request body. Only the fields every OpenAI-compatible
/// server understands — timestamps and other local bookkeeping stay off the
/// wire.
#[derive(Serialize, Debug)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub stream: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct WireMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Raw non-streaming response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for one OpenAI-compatible endpoint and model.
#[derive(Debug)]
pub struct OpenAiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) completions_url: String,
    pub(crate) model: String,
}

impl OpenAiClient {
    /// Create a client for a base URL and model, with a bounded request
    /// timeout covering streaming calls too.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("hermit/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            completions_url: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    /// Client for a project's active provider and model.
    pub fn for_config(config: &HermitConfig) -> Result<Self, String> {
        let endpoint = config.active_endpoint()?;
        Self::new(
            &endpoint.base_url,
            &config.active_model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn request_body<'a>(
        &'a self,
        turns: &'a [Turn],
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|t| WireMessage {
                    role: t.role,
                    content: &t.content,
                })
                .collect(),
            stream,
        }
    }

    /// Send a non-streaming chat completion request.
    pub async fn chat(&self, turns: &[Turn]) -> Result<String, String> {
        let body = self.request_body(turns, false);
        debug!(
            "completion request: model={}, turns={}",
            self.model,
            turns.len()
        );

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.completions_url)
            // Some servers insist on the header; the value is ignored.
            .header("Authorization", "Bearer hermit")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;
        debug!(
            "completion response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("provider HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;
        if let Some(err) = parsed.error {
            return Err(format!("provider error: {}", err.message));
        }
        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| "provider returned no content".to_string())
    }
}

impl CompletionProvider for OpenAiClient {
    fn complete<'a>(&'a self, turns: &'a [Turn]) -> ProviderFuture<'a> {
        Box::pin(self.chat(turns))
    }

    fn stream_complete<'a>(
        &'a self,
        turns: &'a [Turn],
        on_chunk: &'a mut (dyn FnMut(&str) + Send),
    ) -> ProviderFuture<'a> {
        Box::pin(self.chat_stream_live(turns, on_chunk))
    }
}
