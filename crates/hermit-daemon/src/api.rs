//! Route handlers.
//!
//! Each handler loads the requesting project's config, builds a provider
//! client from it, and forwards a formatted prompt. Streaming routes reply
//! with a plain-text body; provider failures after the stream has started
//! are folded into the body as text, so the client always sees a record of
//! the failure.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use hermit_core::config::HermitConfig;
use hermit_core::provider::{OpenAiClient, models as provider_models};
use hermit_core::{PERSONA, Turn};
use serde_json::json;
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::error;

use crate::models::{
    ChatProxyRequest, DiagnoseRequest, PromptRequest, ProviderModelsRequest, ScribeRequest,
};
use crate::prompts;

/// Bound on the provider `/v1/models` probe.
const MODELS_TIMEOUT: Duration = Duration::from_secs(10);

// ── Errors ─────────────────────────────────────────────────────────

/// Error response carrying a status code and a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn config(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn bad_gateway(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

// ── Shared plumbing ────────────────────────────────────────────────

/// Load a project's config and build a provider client from it.
fn load_client(project: &Path) -> Result<(HermitConfig, OpenAiClient), ApiError> {
    let config = HermitConfig::load(project)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::config("Config not found. Run 'hermit invoke'."))?;
    if !config.is_configured() {
        return Err(ApiError::config(
            "No active provider or model configured. Run 'hermit invoke'.",
        ));
    }
    let client = OpenAiClient::for_config(&config).map_err(ApiError::config)?;
    Ok((config, client))
}

/// Stream a completion as a plain-text body.
fn stream_completion(client: OpenAiClient, turns: Vec<Turn>) -> Response {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Bytes, Infallible>>();
    tokio::spawn(async move {
        let sender = tx.clone();
        let mut sink = move |chunk: &str| {
            let _ = sender.send(Ok(Bytes::copy_from_slice(chunk.as_bytes())));
        };
        if let Err(e) = client.chat_stream_live(&turns, &mut sink).await {
            error!("provider stream failed: {e}");
            let _ = tx.send(Ok(Bytes::from(format!(
                "\n\n[error] provider request failed: {e}"
            ))));
        }
    });
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(UnboundedReceiverStream::new(rx)),
    )
        .into_response()
}

// ── Handlers ───────────────────────────────────────────────────────

/// `POST /hermit/ponder` — stream an answer to a one-off question.
pub async fn ponder(Json(req): Json<PromptRequest>) -> Result<Response, ApiError> {
    let (_config, client) = load_client(&req.project_path)?;
    let turns = vec![Turn::system(PERSONA), Turn::user(req.prompt)];
    Ok(stream_completion(client, turns))
}

/// `POST /hermit/chat` — stream a reply to a full conversation.
pub async fn chat(Json(req): Json<ChatProxyRequest>) -> Result<Response, ApiError> {
    let (_config, client) = load_client(&req.project_path)?;
    Ok(stream_completion(client, req.messages))
}

/// `POST /hermit/chat/complete` — one-shot reply to a full conversation.
/// Used by the CLI's summarizer, which needs the whole string at once.
pub async fn chat_complete(
    Json(req): Json<ChatProxyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_config, client) = load_client(&req.project_path)?;
    let response = client
        .chat(&req.messages)
        .await
        .map_err(ApiError::bad_gateway)?;
    Ok(Json(json!({ "response": response })))
}

/// `POST /hermit/scribe` — commit message for a staged diff.
pub async fn scribe(Json(req): Json<ScribeRequest>) -> Result<Json<serde_json::Value>, ApiError> {
    let (_config, client) = load_client(&req.project_path)?;
    let prompt = prompts::scribe_prompt(&req.diff);
    let response = client
        .chat(&[Turn::user(prompt)])
        .await
        .map_err(ApiError::bad_gateway)?;
    Ok(Json(json!({ "response": response })))
}

/// `POST /hermit/diagnose` — stream a diagnosis of a failed command.
pub async fn diagnose(Json(req): Json<DiagnoseRequest>) -> Result<Response, ApiError> {
    let (_config, client) = load_client(&req.project_path)?;
    let prompt = prompts::diagnose_prompt(
        &req.error_log,
        req.source_code.as_deref(),
        req.language.as_deref(),
    );
    let turns = vec![Turn::system(PERSONA), Turn::user(prompt)];
    Ok(stream_completion(client, turns))
}

/// `POST /hermit/provider/models` — list a provider's models.
pub async fn provider_models(
    Json(req): Json<ProviderModelsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(MODELS_TIMEOUT)
        .build()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let models = provider_models::list_models(&client, &req.base_url)
        .await
        .map_err(|e| {
            error!("model listing for '{}' failed: {e}", req.name);
            if e.contains("failed to connect") {
                ApiError::bad_gateway(format!(
                    "Failed to connect to provider at {}. Is the server running?",
                    req.base_url
                ))
            } else {
                ApiError::internal(e)
            }
        })?;
    Ok(Json(json!({ "models": models })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn api_error_renders_detail_body() {
        let resp = ApiError::config("Config not found. Run 'hermit invoke'.").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "Config not found. Run 'hermit invoke'.");
    }

    #[test]
    fn load_client_without_config_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_client(dir.path()).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.detail.contains("hermit invoke"));
    }

    #[test]
    fn load_client_with_unselected_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        HermitConfig::default().save(dir.path()).unwrap();
        let err = load_client(dir.path()).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.detail.contains("No active provider or model"));
    }

    #[test]
    fn load_client_with_config_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let config = HermitConfig {
            active_provider: "ollama".into(),
            active_model: "llama3.1".into(),
            ..Default::default()
        };
        config.save(dir.path()).unwrap();

        let (loaded, client) = load_client(dir.path()).unwrap();
        assert_eq!(loaded.active_model, "llama3.1");
        assert_eq!(client.model(), "llama3.1");
    }
}
