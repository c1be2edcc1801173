//! Persistent chat sessions.
//!
//! A session is one log file under `<project>/.hermit/chats/`: UTF-8, one
//! JSON turn per line, named after the slugified session name.
//! [`store`] owns the file discipline (append-only writes, tolerant loads,
//! atomic rewrites behind a per-session lock); [`chat`] is the interactive
//! state machine that drives it.

pub mod chat;
pub mod store;

pub use chat::{ChatSession, EXIT_TOKEN, TokenReport};
pub use store::{HistoryStore, slugify};
