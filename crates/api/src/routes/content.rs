use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use site_admin_core::document::editor::{ContentEditor, SettingsEditor};
use site_admin_core::document::path;

use crate::auth::AdminClaims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Content tree and site settings editing.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/content/{language}", get(get_content).patch(edit_content))
        .route("/v1/settings", get(get_settings).put(update_settings))
}

/// One edit: store `value` at `path` inside the language's content tree.
#[derive(Debug, Deserialize)]
pub struct ContentEdit {
    pub path: path::Path,
    pub value: Value,
}

#[derive(Debug, Serialize)]
struct EditResponse {
    applied: bool,
    content: Value,
}

async fn get_content(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> ApiResult<Json<Value>> {
    let editor = ContentEditor::load(state.partitions(), &language).await?;
    Ok(Json(editor.content().clone()))
}

/// Apply an edit and persist it. An edit that does not fit the stored tree
/// is not an error: it is dropped and `applied` is false. Edits of the same
/// language are serialised so none is lost between load and save.
async fn edit_content(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(language): Path<String>,
    Json(edit): Json<ContentEdit>,
) -> ApiResult<Json<EditResponse>> {
    if edit.path.is_empty() {
        return Err(ApiError::BadRequest("path must not be empty".into()));
    }
    let _guard = state.edit_lock(&format!("content:{language}")).await;
    let mut editor = ContentEditor::load(state.partitions(), &language).await?;
    let applied = editor.apply(&edit.path, edit.value);
    if applied {
        editor.save(state.partitions()).await?;
    }
    Ok(Json(EditResponse {
        applied,
        content: editor.content().clone(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    ignored: Vec<String>,
    settings: Value,
}

async fn get_settings(
    _admin: AdminClaims,
    State(state): State<AppState>,
) -> ApiResult<Json<Value>> {
    let editor = SettingsEditor::load(state.partitions()).await?;
    Ok(Json(editor.to_record()))
}

async fn update_settings(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<SettingsResponse>> {
    let _guard = state.edit_lock("settings").await;
    let mut editor = SettingsEditor::load(state.partitions()).await?;
    let mut ignored = Vec::new();
    for (key, value) in update.fields {
        if !editor.set(&key, value) {
            ignored.push(key);
        }
    }
    if editor.is_dirty() {
        editor.save(state.partitions()).await?;
    }
    Ok(Json(SettingsResponse {
        ignored,
        settings: editor.to_record(),
    }))
}
