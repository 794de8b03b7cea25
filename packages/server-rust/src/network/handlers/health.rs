//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Detailed health information as JSON.
///
/// Always returns 200; the `state` field tells monitoring whether the
/// gateway is serving or draining. A registry failure is reported in the
/// body rather than as a status.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.shutdown.health_state();
    let resources = match state.gateway.resource_count().await {
        Ok(count) => json!(count),
        Err(err) => json!({ "error": err.to_string() }),
    };

    Json(json!({
        "state": health.as_str(),
        "registries": state.gateway.registries().ids(),
        "resources": resources,
        "filter_rules": state.gateway.filter().rule_count(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: always 200 while the process responds.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 when ready, 503 while starting, draining or stopped.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
