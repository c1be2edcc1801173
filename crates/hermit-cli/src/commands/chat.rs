//! `hermit chat new` / `hermit chat recall` — persistent chat sessions.
//!
//! The CLI side is a thin interactive driver over
//! [`hermit_core::session::ChatSession`]: it reads lines from stdin, renders
//! streamed replies, and prints the token ratio after each turn. Model
//! traffic flows through the daemon via [`DaemonClient`]'s
//! `CompletionProvider` implementation, so the session's background
//! summarizer uses the same path.

use crate::client::DaemonClient;
use console::style;
use dialoguer::FuzzySelect;
use hermit_core::config::{self, HermitConfig};
use hermit_core::context::{TokenAccountant, TokenCounter};
use hermit_core::provider::CompletionProvider;
use hermit_core::session::{ChatSession, EXIT_TOKEN, HistoryStore, slugify};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn new_session(
    daemon: DaemonClient,
    project: &Path,
    name: Option<String>,
) -> Result<(), String> {
    let config = require_config(project)?;
    let name = name.unwrap_or_else(|| chrono::Local::now().format("%b-%d-at-%I-%M%p").to_string());
    let path = config::chats_path(project).join(slugify(&name));

    let (provider, counter) = session_parts(daemon, &config);
    let session =
        ChatSession::create(HistoryStore::new(path), provider, counter, hermit_core::PERSONA)
            .await?;
    run_loop(session, &config).await
}

pub async fn recall_session(daemon: DaemonClient, project: &Path) -> Result<(), String> {
    let config = require_config(project)?;
    let chats_dir = config::chats_path(project);

    let mut names: Vec<String> = match std::fs::read_dir(&chats_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    if names.is_empty() {
        return Err("no saved sessions. Start one with 'hermit chat new'.".to_string());
    }

    let selected = FuzzySelect::new()
        .with_prompt("Which chat session would you like to recall? (Start typing to filter)")
        .items(&names)
        .default(0)
        .interact()
        .map_err(|e| format!("selection aborted: {e}"))?;
    let path = chats_dir.join(&names[selected]);

    let (provider, counter) = session_parts(daemon, &config);
    let session = ChatSession::resume(HistoryStore::new(path), provider, counter).await?;
    run_loop(session, &config).await
}

/// Chat requires a configured model: the token accountant is built from the
/// model name, so a missing config is fatal before the loop starts.
fn require_config(project: &Path) -> Result<HermitConfig, String> {
    let config = HermitConfig::load(project)?
        .ok_or_else(|| "no configuration found. Run 'hermit invoke' first.".to_string())?;
    if !config.is_configured() {
        return Err("no active provider or model configured. Run 'hermit invoke' first.".to_string());
    }
    Ok(config)
}

fn session_parts(
    daemon: DaemonClient,
    config: &HermitConfig,
) -> (Arc<dyn CompletionProvider>, Arc<dyn TokenCounter>) {
    (
        Arc::new(daemon),
        Arc::new(TokenAccountant::new(
            &config.active_model,
            config.context_window,
        )),
    )
}

/// The interactive read-eval loop. Empty input re-prompts, `/bye` (any case)
/// exits, anything else becomes a turn. A finished background compaction is
/// reconciled between prompts.
async fn run_loop(mut session: ChatSession, config: &HermitConfig) -> Result<(), String> {
    let file_name = session
        .log_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!(
        "🧙 Chatting in session: {} with {}. Type '{}' to exit.",
        style(&file_name).white().bold(),
        style(&config.active_model).white().bold(),
        EXIT_TOKEN,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        session.reap_compaction().await?;

        print!("> ");
        std::io::stdout()
            .flush()
            .map_err(|e| format!("failed to flush stdout: {e}"))?;
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("failed to read input: {e}"))?
        else {
            // stdin closed; treat like an exit.
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case(EXIT_TOKEN) {
            println!("\n{}\n", style("Farewell").italic().dim());
            break;
        }

        let mut render = |chunk: &str| {
            print!("{}", style(chunk).italic());
            let _ = std::io::stdout().flush();
        };
        let report = session.submit(input, &mut render).await?;
        println!(
            "\n{}",
            style(format!("tokens used: {}/{}", report.used, report.limit)).dim()
        );
    }

    // Settle a compaction that finished while the last turn was typed; one
    // still in flight is abandoned (the rewrite is atomic either way).
    session.reap_compaction().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_derived_session_names_slugify_cleanly() {
        let name = chrono::Local::now().format("%b-%d-at-%I-%M%p").to_string();
        let slug = slugify(&name);
        assert!(slug.ends_with(".json"));
        assert!(
            slug.trim_end_matches(".json")
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn missing_config_is_a_fatal_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = require_config(dir.path()).unwrap_err();
        assert!(err.contains("hermit invoke"));
    }

    #[test]
    fn unselected_model_is_a_fatal_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        HermitConfig::default().save(dir.path()).unwrap();
        let err = require_config(dir.path()).unwrap_err();
        assert!(err.contains("hermit invoke"));
    }
}
