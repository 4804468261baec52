use std::env;

use agentic_rag::core;
use agentic_rag::server;
use agentic_rag::state::AppState;
use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    if let Err(err) = core::logging::init(&state.paths) {
        eprintln!("Failed to initialise logging: {}", err);
    }

    if let Err(err) = state.pipeline.ensure_ready().await {
        tracing::warn!("Search backends not ready yet: {}", err);
    }

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(state.settings.server.port);
    let bind_addr = format!("{}:{}", state.settings.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
