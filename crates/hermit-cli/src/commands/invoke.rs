//! `hermit invoke` — the configuration wizard.
//!
//! Picks a provider from the configured catalog, fetches its models through
//! the daemon, picks a default model, and saves `.hermit/config.toml`.
//! Re-running merges over the existing file, so a saved catalog or a
//! `context_window` override survives reconfiguration.

use crate::client::DaemonClient;
use crate::ui;
use console::style;
use dialoguer::Select;
use hermit_core::config::{HermitConfig, default_providers};
use std::path::Path;

pub async fn run(daemon: &DaemonClient, project: &Path) -> Result<(), String> {
    let mut config = HermitConfig::load(project)?.unwrap_or_default();
    if config.providers.is_empty() {
        config.providers = default_providers();
    }

    let names: Vec<&str> = config.providers.iter().map(|p| p.name.as_str()).collect();
    let selected = Select::new()
        .with_prompt("Which local AI provider would you like to use?")
        .items(&names)
        .default(0)
        .interact()
        .map_err(|e| format!("selection aborted: {e}"))?;
    let endpoint = config.providers[selected].clone();

    let spinner = ui::moon_spinner(&format!("Fetching models from {}...", endpoint.name));
    let models = daemon.provider_models(&endpoint).await;
    spinner.finish_and_clear();
    let models = models?;
    if models.is_empty() {
        return Err(format!(
            "No models found for {}. Is the server running?",
            endpoint.name
        ));
    }

    let selected_model = Select::new()
        .with_prompt(format!("Select a default model from {}:", endpoint.name))
        .items(&models)
        .default(0)
        .interact()
        .map_err(|e| format!("selection aborted: {e}"))?;

    config.active_provider = endpoint.name;
    config.active_model = models[selected_model].clone();
    config.save(project)?;

    println!(
        "\n{} hermit is now configured to use {} via {}.",
        style("Success!").bold(),
        style(&config.active_model).white().bold(),
        style(&config.active_provider).white().bold(),
    );
    Ok(())
}
