use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Full health check. Verifies the content store is reachable.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.partitions().ping().await?;

    Ok(Json(json!({
        "status": "ok",
        "database": "connected",
        "subscribers": state.event_bus().subscriber_count(),
    })))
}

/// Lightweight ping without a database check.
async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
