//! Server-Sent Events (SSE) streaming for the chat completions endpoint.
//!
//! OpenAI-compatible servers stream responses as `data:` lines, each
//! carrying a JSON chunk with an incremental content delta, terminated by
//! `data: [DONE]`. [`OpenAiClient::chat_stream_live`] reads the body
//! incrementally and invokes a callback per text fragment, in arrival
//! order, so callers can render output as it is generated.

use super::OpenAiClient;
use crate::Turn;
use serde::Deserialize;
use tracing::{debug, warn};

/// Raw SSE data chunk from the provider.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAiClient {
    /// Send a streaming chat request, invoking `on_chunk` for each text
    /// fragment as it arrives off the wire. Returns the concatenated text.
    ///
    /// A malformed chunk is skipped with a warning; an HTTP error before the
    /// stream starts is returned as `Err`.
    pub async fn chat_stream_live(
        &self,
        turns: &[Turn],
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, String> {
        let body = self.request_body(turns, true);
        debug!(
            "streaming completion request: model={}, turns={}",
            self.model,
            turns.len()
        );

        let mut resp = self
            .client
            .post(&self.completions_url)
            .header("Authorization", "Bearer hermit")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("streaming request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("provider HTTP {status}: {text}"));
        }

        let mut text = String::new();
        let mut buffer = String::new();
        let mut done = false;

        // Read the body incrementally via chunk() so long generations render
        // as they arrive instead of waiting on the full response.
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process all complete lines in the buffer.
            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                let line = line.trim();
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }
                if line == "data: [DONE]" {
                    done = true;
                    break;
                }
                if let Some(data) = line.strip_prefix("data: ")
                    && let Some(delta) = parse_sse_data(data)
                {
                    on_chunk(&delta);
                    text.push_str(&delta);
                }
            }

            if done {
                break;
            }
        }

        // Incomplete final line, if the stream ended without [DONE].
        let remaining = buffer.trim();
        if !done
            && !remaining.is_empty()
            && remaining != "data: [DONE]"
            && let Some(data) = remaining.strip_prefix("data: ")
            && let Some(delta) = parse_sse_data(data)
        {
            on_chunk(&delta);
            text.push_str(&delta);
        }

        debug!("stream complete: {} chars", text.len());
        Ok(text)
    }
}

/// Extract the content delta from a single SSE `data:` payload.
fn parse_sse_data(data: &str) -> Option<String> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            warn!("failed to parse SSE chunk: {e} — data: {data}");
            return None;
        }
    };
    chunk
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_data(data).as_deref(), Some("Hel"));
    }

    #[test]
    fn empty_delta_is_skipped() {
        let data = r#"{"choices":[{"delta":{"content":""}}]}"#;
        assert!(parse_sse_data(data).is_none());
    }

    #[test]
    fn final_chunk_without_content_is_skipped() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(parse_sse_data(data).is_none());
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        assert!(parse_sse_data("{not json").is_none());
    }

    #[test]
    fn fragments_concatenate_in_order() {
        let chunks = [
            r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"{"choices":[{"delta":{"content":", "}}]}"#,
            r#"{"choices":[{"delta":{"content":"world"}}]}"#,
        ];
        let text: String = chunks.iter().filter_map(|c| parse_sse_data(c)).collect();
        assert_eq!(text, "Hello, world");
    }
}
