use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use axum_extra::{headers::ContentType, TypedHeader};
use serde::{Deserialize, Serialize};
use site_admin_core::events::types::SiteEvent;
use site_admin_core::media::ImageInfo;

use crate::auth::AdminClaims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Image library: upload, list, rename and delete.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/images",
            get(list_images).patch(rename_image).delete(delete_images),
        )
        .route("/v1/images/{file_name}", put(upload_image))
}

async fn list_images(
    _admin: AdminClaims,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ImageInfo>>> {
    Ok(Json(state.images().list().await?))
}

/// The request body is the raw image; its `Content-Type` must be `image/*`.
async fn upload_image(
    admin: AdminClaims,
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    TypedHeader(content_type): TypedHeader<ContentType>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ImageInfo>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("image body is empty".into()));
    }
    let info = state
        .images()
        .upload(&file_name, &content_type.to_string(), body.to_vec())
        .await?;
    tracing::info!(user = %admin.sub, path = %info.path, "Image uploaded");
    state.event_bus().publish(SiteEvent::ImageUploaded {
        path: info.path.clone(),
    });
    Ok((StatusCode::CREATED, Json(info)))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub path: String,
    /// New file name without extension.
    pub name: String,
}

async fn rename_image(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<ImageInfo>> {
    let info = state.images().rename(&request.path, &request.name).await?;
    state.event_bus().publish(SiteEvent::ImagesDeleted {
        paths: vec![request.path],
    });
    state.event_bus().publish(SiteEvent::ImageUploaded {
        path: info.path.clone(),
    });
    Ok(Json(info))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    deleted: Vec<String>,
}

async fn delete_images(
    admin: AdminClaims,
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> ApiResult<Json<DeleteResponse>> {
    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("paths must not be empty".into()));
    }
    let deleted = state.images().delete(&request.paths).await?;
    tracing::info!(user = %admin.sub, count = deleted.len(), "Images deleted");
    if !deleted.is_empty() {
        state.event_bus().publish(SiteEvent::ImagesDeleted {
            paths: deleted.clone(),
        });
    }
    Ok(Json(DeleteResponse { deleted }))
}
