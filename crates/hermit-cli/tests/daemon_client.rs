//! Integration tests for the CLI's daemon client.
//!
//! These bind a real daemon on a random port and drive it through
//! [`hermit_cli::DaemonClient`], including its `CompletionProvider`
//! implementation — the same path the chat session loop and its summarizer
//! use. No model server sits behind the daemon, so every test exercises the
//! error surfaces: `detail` bodies, connection advice, and in-band stream
//! failures.

use hermit_cli::DaemonClient;
use hermit_core::Turn;
use hermit_core::config::{HermitConfig, ProviderEndpoint};
use hermit_core::provider::CompletionProvider;

async fn spawn_daemon() -> String {
    let addr = hermit_daemon::start_server(hermit_daemon::build_router(), ([127, 0, 0, 1], 0).into())
        .await
        .unwrap();
    format!("http://{addr}")
}

/// A localhost port with nothing listening on it.
async fn dead_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn configure_project(dir: &std::path::Path) {
    let port = dead_port().await;
    let config = HermitConfig {
        active_provider: "ollama".into(),
        active_model: "llama3.1".into(),
        providers: vec![ProviderEndpoint {
            name: "ollama".into(),
            base_url: format!("http://127.0.0.1:{port}/"),
        }],
        context_window: None,
        request_timeout_secs: 5,
    };
    config.save(dir).unwrap();
}

#[tokio::test]
async fn scribe_without_config_surfaces_the_detail() {
    let base = spawn_daemon().await;
    let dir = tempfile::tempdir().unwrap();
    let client = DaemonClient::new(&base, dir.path()).unwrap();

    let err = client.scribe("diff --git a b").await.unwrap_err();
    assert!(err.contains("404"), "error was: {err}");
    assert!(err.contains("hermit invoke"), "error was: {err}");
}

#[tokio::test]
async fn unreachable_daemon_advises_starting_it() {
    let port = dead_port().await;
    let dir = tempfile::tempdir().unwrap();
    let client = DaemonClient::new(&format!("http://127.0.0.1:{port}"), dir.path()).unwrap();

    let err = client.scribe("diff").await.unwrap_err();
    assert!(err.contains("hermit-daemon"), "error was: {err}");
}

#[tokio::test]
async fn ponder_streams_inline_provider_failure() {
    let base = spawn_daemon().await;
    let dir = tempfile::tempdir().unwrap();
    configure_project(dir.path()).await;
    let client = DaemonClient::new(&base, dir.path()).unwrap();

    let mut seen = String::new();
    let mut sink = |chunk: &str| seen.push_str(chunk);
    let text = client.ponder("hello?", &mut sink).await.unwrap();

    // The daemon folds the provider failure into the body.
    assert!(text.contains("[error]"), "body was: {text}");
    assert_eq!(seen, text);
}

#[tokio::test]
async fn completion_provider_complete_maps_provider_failure_to_err() {
    let base = spawn_daemon().await;
    let dir = tempfile::tempdir().unwrap();
    configure_project(dir.path()).await;
    let client = DaemonClient::new(&base, dir.path()).unwrap();

    let turns = vec![Turn::system("persona"), Turn::user("hi")];
    let err = client.complete(&turns).await.unwrap_err();
    assert!(err.contains("502"), "error was: {err}");
}

#[tokio::test]
async fn provider_models_against_dead_provider_is_an_error() {
    let base = spawn_daemon().await;
    let dir = tempfile::tempdir().unwrap();
    let client = DaemonClient::new(&base, dir.path()).unwrap();

    let port = dead_port().await;
    let endpoint = ProviderEndpoint {
        name: "ollama".into(),
        base_url: format!("http://127.0.0.1:{port}/"),
    };
    let err = client.provider_models(&endpoint).await.unwrap_err();
    assert!(err.contains("Is the server running?"), "error was: {err}");
}
