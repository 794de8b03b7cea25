//! `POST /filters/reload`: re-read the attribute filter rules file.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::error::GatewayError;

/// Swaps in the rules from the configured file. On failure the previous
/// rules stay active and the error is returned as 500.
pub async fn reload_filters_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let rules = state.gateway.reload_filters()?;
    Ok(Json(json!({ "rules": rules })))
}
