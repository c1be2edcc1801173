//! Provider model listing with a shape-tolerant response parser.
//!
//! The `/v1/models` route is nominally standard, but local servers disagree
//! on the details: most return `{"data": [{"id": ...}]}`, some return
//! `{"models": [{"name": ...}]}`. The parser tries the first field set,
//! falls back to the second, and anything else is an explicit error rather
//! than a silent empty list.

use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct ModelsResponse {
    data: Option<Vec<ModelEntry>>,
    models: Option<Vec<ModelEntry>>,
}

#[derive(Deserialize, Debug)]
struct ModelEntry {
    id: Option<String>,
    name: Option<String>,
}

/// Extract model names from a `/v1/models` response body.
pub fn parse_models_response(value: &serde_json::Value) -> Result<Vec<String>, String> {
    let parsed: ModelsResponse = serde_json::from_value(value.clone())
        .map_err(|e| format!("unrecognized provider response shape: {e}"))?;
    let entries = parsed
        .data
        .or(parsed.models)
        .ok_or_else(|| {
            "unrecognized provider response shape: expected a 'data' or 'models' array".to_string()
        })?;
    entries
        .into_iter()
        .map(|entry| {
            entry.id.or(entry.name).ok_or_else(|| {
                "unrecognized provider response shape: model entry has neither 'id' nor 'name'"
                    .to_string()
            })
        })
        .collect()
}

/// Fetch the models a provider serves.
pub async fn list_models(client: &reqwest::Client, base_url: &str) -> Result<Vec<String>, String> {
    let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("failed to connect to provider at {base_url}: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(format!("provider HTTP {status}: {text}"));
    }

    let value: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| format!("failed to parse provider response: {e}"))?;
    parse_models_response(&value)
}
