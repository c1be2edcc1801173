//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::routing::post;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;

/// Build the full axum router for the daemon.
pub fn build_router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/hermit/ponder", post(api::ponder))
        .route("/hermit/chat", post(api::chat))
        .route("/hermit/chat/complete", post(api::chat_complete))
        .route("/hermit/scribe", post(api::scribe))
        .route("/hermit/diagnose", post(api::diagnose))
        .route("/hermit/provider/models", post(api::provider_models))
        .layer(cors)
}

/// Bind and serve until the process exits.
pub async fn serve(router: Router, bind_addr: SocketAddr) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read local address: {e}"))?;
    info!("hermit daemon listening on http://{addr}");
    axum::serve(listener, router)
        .await
        .map_err(|e| format!("server error: {e}"))
}

/// Bind, spawn the server onto the runtime, and return the bound address.
/// Used by integration tests; the binary uses [`serve`].
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> Result<SocketAddr, String> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| format!("failed to bind {bind_addr}: {e}"))?;
    let addr = listener
        .local_addr()
        .map_err(|e| format!("failed to read local address: {e}"))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("server error: {e}");
        }
    });
    Ok(addr)
}
