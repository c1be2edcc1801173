//! Context-window management: token accounting and history summarization.
//!
//! The context window is the scarcest resource in a chat session. Two
//! cooperating pieces keep a session inside it:
//!
//! 1. **[`tokens`]** — [`TokenAccountant`] counts real BPE tokens for every
//!    turn and derives the session's [`ContextBudget`] (compaction triggers
//!    at 80% of the window, summaries aim for 60%).
//!
//! 2. **[`summarizer`]** — when the budget is exceeded, the oldest turns
//!    after the persona are condensed into a single `"Summary:"` system turn
//!    by a one-shot LLM call, and the history file is rewritten atomically.
//!
//! Both run from the session loop in [`crate::session::chat`]; the
//! summarizer executes on a background task so the interactive prompt never
//! blocks on it.

pub mod summarizer;
pub mod tokens;

pub use summarizer::SUMMARY_MARKER;
pub use tokens::{ContextBudget, TokenAccountant, TokenCounter};
