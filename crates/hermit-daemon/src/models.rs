//! Request bodies for the daemon's routes.
//!
//! Every project-scoped request carries `project_path` so the daemon can
//! load that project's `.hermit/config.toml` — one daemon serves any number
//! of configured checkouts.

use hermit_core::Turn;
use serde::Deserialize;
use std::path::PathBuf;

/// `POST /hermit/ponder` — a free-form question.
#[derive(Deserialize, Debug)]
pub struct PromptRequest {
    pub prompt: String,
    pub project_path: PathBuf,
}

/// `POST /hermit/chat` and `/hermit/chat/complete` — a full conversation.
#[derive(Deserialize, Debug)]
pub struct ChatProxyRequest {
    pub messages: Vec<Turn>,
    pub project_path: PathBuf,
}

/// `POST /hermit/scribe` — staged diff to turn into a commit message.
#[derive(Deserialize, Debug)]
pub struct ScribeRequest {
    pub diff: String,
    pub project_path: PathBuf,
}

/// `POST /hermit/diagnose` — a failed command's output, plus the offending
/// source file when the CLI could locate one.
#[derive(Deserialize, Debug)]
pub struct DiagnoseRequest {
    pub error_log: String,
    #[serde(default)]
    pub source_code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub project_path: PathBuf,
}

/// `POST /hermit/provider/models` — list the models a provider serves.
#[derive(Deserialize, Debug)]
pub struct ProviderModelsRequest {
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_accepts_persisted_turn_shape() {
        let raw = r#"{
            "messages": [
                {"role": "system", "content": "persona", "timestamp": "2025-07-01T12:00:00Z"},
                {"role": "user", "content": "hi"}
            ],
            "project_path": "/tmp/proj"
        }"#;
        let req: ChatProxyRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[1].content, "hi");
    }

    #[test]
    fn provider_models_request_uses_camel_case_base_url() {
        let raw = r#"{"name": "ollama", "baseUrl": "http://localhost:11434/"}"#;
        let req: ProviderModelsRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.base_url, "http://localhost:11434/");
    }

    #[test]
    fn diagnose_request_optional_fields_default() {
        let raw = r#"{"error_log": "boom", "project_path": "/tmp/proj"}"#;
        let req: DiagnoseRequest = serde_json::from_str(raw).unwrap();
        assert!(req.source_code.is_none());
        assert!(req.language.is_none());
    }
}
