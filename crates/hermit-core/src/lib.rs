//! Core library for the hermit local AI assistant.
//!
//! hermit is a local-first developer assistant: a CLI talks to a companion
//! daemon, which forwards prompts to an OpenAI-compatible model server
//! running on the developer's machine (ollama, LM Studio, koboldcpp, ...).
//! This crate holds everything the two binaries share:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Per-project configuration under `.hermit/config.toml` |
//! | [`provider`] | OpenAI-compatible completion client: one-shot, SSE streaming, model listing |
//! | [`context`] | Token accounting against the model's context window, and the summarization policy |
//! | [`session`] | Persistent chat sessions: line-delimited history store and the interactive session loop |
//!
//! The heart of the crate is [`session::chat::ChatSession`]: it owns an
//! append-only history file, tracks the token cost of the conversation, and
//! once usage crosses 80% of the model's context window it compacts the
//! oldest turns into a single summary turn via a background task — without
//! blocking the interactive prompt. See [`context::summarizer`] for the
//! compaction policy and [`session::store`] for the file discipline that
//! keeps the log consistent while both are writing.

pub mod config;
pub mod context;
pub mod provider;
pub mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

/// System persona prepended to every chat session and one-shot prompt.
pub const PERSONA: &str = "You are Hermit, a local AI assistant. Your persona is that of a wise, \
solitary sage. Your answers should always be concise, direct, and helpful. For coding tasks, \
provide clear solutions. For philosophical or creative questions, answer very briefly and your \
tone can be more enigmatic and thoughtful.";

// ── Turn types ─────────────────────────────────────────────────────

/// Role of a turn in a conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchange unit in a conversation.
///
/// A turn is constructed without a timestamp; [`session::store::HistoryStore`]
/// assigns one immediately before the serialized line is flushed, so the
/// timestamp records persistence time rather than construction time. Turns
/// are immutable once persisted — summarization rewrites the history *file*,
/// never an individual record.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Format as a role-labeled transcript line for summary prompts.
    pub fn transcript_line(&self) -> String {
        format!("[{}]: {}", self.role, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_constructors() {
        let sys = Turn::system("persona");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "persona");
        assert!(sys.timestamp.is_none());

        let user = Turn::user("hello");
        assert_eq!(user.role, Role::User);

        let assistant = Turn::assistant("hi there");
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, Role::System);
    }

    #[test]
    fn unstamped_turn_omits_timestamp_field() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn transcript_line_labels_role() {
        let line = Turn::user("what is rust?").transcript_line();
        assert_eq!(line, "[user]: what is rust?");
    }
}
