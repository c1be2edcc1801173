//! HTTP client for the hermit daemon.
//!
//! Every command goes through [`DaemonClient`]: one-shot routes return a
//! `{"response": ...}` JSON body, streaming routes return plain text read
//! incrementally off the wire. Error bodies carry a `detail` field, which is
//! surfaced to the user verbatim; a connection failure gets a hint to start
//! the daemon.

use hermit_core::Turn;
use hermit_core::config::ProviderEndpoint;
use hermit_core::provider::{CompletionProvider, ProviderFuture};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Bound on one-shot daemon requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Streaming replies render for as long as the model generates; allow more.
const STREAM_TIMEOUT: Duration = Duration::from_secs(180);

/// Client for one daemon address, scoped to one project directory.
///
/// Implements [`CompletionProvider`], so a chat session built on this client
/// streams replies through `/hermit/chat` and summarizes through
/// `/hermit/chat/complete`.
pub struct DaemonClient {
    client: reqwest::Client,
    base_url: String,
    project_path: PathBuf,
}

impl DaemonClient {
    pub fn new(base_url: &str, project_path: impl Into<PathBuf>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("hermit/0.1")
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_path: project_path.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(
        &self,
        endpoint: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, String> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    format!(
                        "could not reach the hermit daemon at {}. \
                         Is it running? Start it with 'hermit-daemon'.",
                        self.base_url
                    )
                } else {
                    format!("daemon request failed: {e}")
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from))
            .unwrap_or(text);
        Err(format!("daemon returned HTTP {status}: {detail}"))
    }

    /// One-shot route: POST, then pull the `response` string out of the body.
    async fn post_for_response(&self, endpoint: &str, payload: &Value) -> Result<String, String> {
        let resp = self.post(endpoint, payload, REQUEST_TIMEOUT).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse daemon response: {e}"))?;
        body.get("response")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| "daemon response had no 'response' field".to_string())
    }

    /// Streaming route: POST, then hand each text fragment to `on_chunk` as
    /// it arrives. Returns the concatenated text.
    async fn stream_text(
        &self,
        endpoint: &str,
        payload: &Value,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, String> {
        let mut resp = self.post(endpoint, payload, STREAM_TIMEOUT).await?;
        let mut text = String::new();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| format!("failed to read daemon stream: {e}"))?
        {
            pending.extend_from_slice(&chunk);
            let fragment = drain_utf8(&mut pending);
            if !fragment.is_empty() {
                on_chunk(&fragment);
                text.push_str(&fragment);
            }
        }
        // Whatever is left is an unfinished sequence from a truncated stream.
        if !pending.is_empty() {
            let fragment = String::from_utf8_lossy(&pending).into_owned();
            on_chunk(&fragment);
            text.push_str(&fragment);
        }
        Ok(text)
    }

    // ── Routes ─────────────────────────────────────────────────────

    pub async fn ponder(
        &self,
        prompt: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, String> {
        let payload = json!({"prompt": prompt, "project_path": self.project_path});
        self.stream_text("/hermit/ponder", &payload, on_chunk).await
    }

    pub async fn scribe(&self, diff: &str) -> Result<String, String> {
        let payload = json!({"diff": diff, "project_path": self.project_path});
        self.post_for_response("/hermit/scribe", &payload).await
    }

    pub async fn diagnose(
        &self,
        error_log: &str,
        source_code: Option<&str>,
        language: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, String> {
        let payload = json!({
            "error_log": error_log,
            "source_code": source_code,
            "language": language,
            "project_path": self.project_path,
        });
        self.stream_text("/hermit/diagnose", &payload, on_chunk)
            .await
    }

    pub async fn provider_models(
        &self,
        endpoint: &ProviderEndpoint,
    ) -> Result<Vec<String>, String> {
        let payload =
            serde_json::to_value(endpoint).map_err(|e| format!("failed to serialize request: {e}"))?;
        let resp = self
            .post("/hermit/provider/models", &payload, REQUEST_TIMEOUT)
            .await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse daemon response: {e}"))?;
        serde_json::from_value(body.get("models").cloned().unwrap_or(Value::Null))
            .map_err(|e| format!("failed to parse model list: {e}"))
    }
}

impl CompletionProvider for DaemonClient {
    fn complete<'a>(&'a self, turns: &'a [Turn]) -> ProviderFuture<'a> {
        Box::pin(async move {
            let payload = json!({"messages": turns, "project_path": self.project_path});
            self.post_for_response("/hermit/chat/complete", &payload)
                .await
        })
    }

    fn stream_complete<'a>(
        &'a self,
        turns: &'a [Turn],
        on_chunk: &'a mut (dyn FnMut(&str) + Send),
    ) -> ProviderFuture<'a> {
        Box::pin(async move {
            let payload = json!({"messages": turns, "project_path": self.project_path});
            self.stream_text("/hermit/chat", &payload, on_chunk).await
        })
    }
}

/// Take the longest valid UTF-8 prefix out of `buf`, leaving any incomplete
/// trailing sequence for the next chunk. Outright invalid bytes are decoded
/// lossily so a garbage byte cannot wedge the stream.
fn drain_utf8(buf: &mut Vec<u8>) -> String {
    match std::str::from_utf8(buf) {
        Ok(s) => {
            let s = s.to_string();
            buf.clear();
            s
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let s = String::from_utf8_lossy(buf.get(..valid).unwrap_or_default()).into_owned();
            buf.drain(..valid);
            s
        }
        Err(_) => {
            let s = String::from_utf8_lossy(buf).into_owned();
            buf.clear();
            s
        }
    }
}
