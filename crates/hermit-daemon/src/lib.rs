//! HTTP daemon for the hermit CLI.
//!
//! Exposes `/hermit/*` routes that load the requesting project's
//! configuration, format a prompt, and forward it to the project's
//! OpenAI-compatible model server — streaming the reply back as plain text
//! where the CLI renders incrementally, or as a small JSON object where a
//! single string suffices. All model traffic flows through
//! [`hermit_core::provider`]; this crate is routing and prompt formatting.

pub mod api;
pub mod models;
pub mod prompts;
pub mod server;

pub use server::{build_router, serve, start_server};
