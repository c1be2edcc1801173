//! Per-project configuration under `.hermit/config.toml`.
//!
//! Every project carrying a `.hermit/` directory gets its own provider and
//! model selection, so two checkouts can point at different local model
//! servers. The loaded [`HermitConfig`] value is threaded explicitly into
//! whatever needs it — there is no process-global configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default provider request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// A known OpenAI-compatible provider endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub name: String,
    /// Camel case on the wire — the config file format predates this crate.
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

/// Project configuration: active provider/model plus the provider catalog.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HermitConfig {
    #[serde(default)]
    pub active_provider: String,
    #[serde(default)]
    pub active_model: String,
    #[serde(default)]
    pub providers: Vec<ProviderEndpoint>,
    /// Context window override for models the tokenizer table does not know
    /// (most local models report nothing useful).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
    /// Bound on every provider call, streaming included.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for HermitConfig {
    fn default() -> Self {
        Self {
            active_provider: String::new(),
            active_model: String::new(),
            providers: default_providers(),
            context_window: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// The local model servers hermit knows out of the box.
pub fn default_providers() -> Vec<ProviderEndpoint> {
    [
        ("ollama", "http://localhost:11434/"),
        ("lm-studio", "http://localhost:1234/"),
        ("koboldcpp", "http://localhost:5001/"),
        ("jan", "http://localhost:1337/"),
        ("gpt4all", "http://localhost:4891/"),
    ]
    .into_iter()
    .map(|(name, url)| ProviderEndpoint {
        name: name.to_string(),
        base_url: url.to_string(),
    })
    .collect()
}

/// Path of the config file for a project directory.
pub fn config_path(project: &Path) -> PathBuf {
    project.join(".hermit").join("config.toml")
}

/// Directory holding a project's chat session logs.
pub fn chats_path(project: &Path) -> PathBuf {
    project.join(".hermit").join("chats")
}

impl HermitConfig {
    /// Load the project's config. `Ok(None)` when no config file exists —
    /// callers decide whether that is fatal (`hermit invoke` treats it as a
    /// starting point, everything else as a configuration error).
    pub fn load(project: &Path) -> Result<Option<Self>, String> {
        let path = config_path(project);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
        Ok(Some(config))
    }

    /// Write the config, creating `.hermit/` if needed.
    pub fn save(&self, project: &Path) -> Result<(), String> {
        let path = config_path(project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).map_err(|e| format!("failed to serialize config: {e}"))?;
        std::fs::write(&path, raw).map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    /// The endpoint matching `active_provider`.
    pub fn active_endpoint(&self) -> Result<&ProviderEndpoint, String> {
        self.providers
            .iter()
            .find(|p| p.name == self.active_provider)
            .ok_or_else(|| format!("active provider '{}' not found", self.active_provider))
    }

    /// Whether a provider and model have been selected.
    pub fn is_configured(&self) -> bool {
        !self.active_provider.is_empty() && !self.active_model.is_empty()
    }
}
