use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::Value;
use site_admin_core::document::collection::{self, Collection};
use site_admin_core::events::types::SiteEvent;
use site_admin_core::store::id_text;

use crate::auth::AdminClaims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Per-record editing of pages, projects, services and social links.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/records/{partition}", get(list_records).post(create_record))
        .route(
            "/v1/records/{partition}/{id}",
            patch(update_record).delete(delete_record),
        )
}

fn editable(partition: &str) -> ApiResult<&'static Collection> {
    collection::collection(partition)
        .ok_or_else(|| ApiError::NotFound(format!("no editable collection `{partition}`")))
}

async fn list_records(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let collection = editable(&partition)?;
    Ok(Json(collection.list(state.partitions()).await?))
}

async fn create_record(
    admin: AdminClaims,
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Json(fields): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let collection = editable(&partition)?;
    let _guard = state.edit_lock(&format!("records:{partition}")).await;
    let record = collection.create(state.partitions(), fields).await?;
    let id = record.get("id").and_then(id_text).unwrap_or_default();
    tracing::info!(user = %admin.sub, %partition, %id, "Record created");
    state.event_bus().publish(SiteEvent::RecordSaved { partition, id });
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
    Json(fields): Json<Value>,
) -> ApiResult<Json<Value>> {
    let collection = editable(&partition)?;
    let _guard = state.edit_lock(&format!("records:{partition}")).await;
    let record = collection
        .update(state.partitions(), &id, fields)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{partition} record `{id}` not found")))?;
    state.event_bus().publish(SiteEvent::RecordSaved { partition, id });
    Ok(Json(record))
}

async fn delete_record(
    admin: AdminClaims,
    State(state): State<AppState>,
    Path((partition, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let collection = editable(&partition)?;
    let _guard = state.edit_lock(&format!("records:{partition}")).await;
    if !collection.delete(state.partitions(), &id).await? {
        return Err(ApiError::NotFound(format!("{partition} record `{id}` not found")));
    }
    tracing::info!(user = %admin.sub, %partition, %id, "Record deleted");
    state.event_bus().publish(SiteEvent::RecordDeleted { partition, id });
    Ok(StatusCode::NO_CONTENT)
}
