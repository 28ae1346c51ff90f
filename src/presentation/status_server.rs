// Status server - Minimal HTTP surface for health checks
use crate::presentation::handlers::status;
use anyhow::Context;
use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Only `/status` is routed, for any method; everything else gets an empty 404.
pub fn router() -> Router {
    Router::new()
        .route("/status", any(status))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status server to {}", addr))?;
    tracing::info!(addr = %addr, "ems.status_server_started");
    serve_on(listener).await
}

async fn serve_on(listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .await
        .context("Status server failed")
}
