use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Reports whether the vector collection and the full-text index are reachable.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (ready, error) = match state.pipeline.ensure_ready().await {
        Ok(()) => (true, None),
        Err(err) => (false, Some(err.to_string())),
    };
    Json(json!({
        "ready": ready,
        "error": error,
        "collection": state.settings.vector.collection,
        "index": state.settings.fulltext.table,
        "max_retries": state.settings.pipeline.max_retries
    }))
}
