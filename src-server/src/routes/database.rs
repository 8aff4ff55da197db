//! Store connectivity and health.
//!
//! Datasets live in process memory, so "connecting" only records when a
//! client first asked and the status check cannot fail.

use axum::extract::State;
use serde_json::json;

use crate::response::{ApiResult, success};
use crate::state::AppState;

/// `GET /api/database/connect`
pub async fn connect(State(state): State<AppState>) -> ApiResult {
    let since = state.connect();
    Ok(success(json!({
        "message": format!("Connected to dataset store (since {}).", since.to_rfc3339()),
    })))
}

/// `GET /api/data/database-status`
pub async fn database_status(State(state): State<AppState>) -> ApiResult {
    let message = match state.connected_at() {
        Some(since) => format!(
            "Database connection is healthy. Connected since {}.",
            since.to_rfc3339()
        ),
        None => "Database connection is healthy.".to_string(),
    };
    Ok(success(json!({ "message": message })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> ApiResult {
    Ok(success(json!({
        "datasets": state.pipeline.store().len(),
        "running_operations": state.pipeline.tracker().running_count(),
    })))
}
