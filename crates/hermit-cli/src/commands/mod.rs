//! Subcommand implementations for the `hermit` binary.

pub mod chat;
pub mod diagnose;
pub mod invoke;
pub mod ponder;
pub mod scribe;
