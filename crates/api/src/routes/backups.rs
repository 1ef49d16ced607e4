use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use site_admin_core::archive::{BackupInfo, RestoreReport};
use uuid::Uuid;

use crate::auth::AdminClaims;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Backup listing, creation and the two-step restore.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/backups", get(list_backups).post(create_backup))
        .route("/v1/backups/{name}/confirmations", post(request_confirmation))
        .route("/v1/restores/{token}", post(restore))
}

async fn list_backups(
    _admin: AdminClaims,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<BackupInfo>>> {
    Ok(Json(state.archiver().list_backups().await?))
}

async fn create_backup(
    admin: AdminClaims,
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<BackupInfo>)> {
    tracing::info!(user = %admin.sub, "Backup requested");
    let info = state.archiver().create_backup().await?;
    Ok((StatusCode::CREATED, Json(info)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmationResponse {
    token: Uuid,
    backup: String,
    description: String,
    expires_at: DateTime<Utc>,
}

async fn request_confirmation(
    _admin: AdminClaims,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ConfirmationResponse>> {
    let token = state.archiver().request_confirmation(&name).await?;
    let ttl = chrono::Duration::from_std(state.config().confirmation_ttl)
        .map_err(|e| ApiError::BadRequest(format!("confirmation ttl out of range: {e}")))?;
    let response = ConfirmationResponse {
        token: token.id(),
        backup: token.backup().to_string(),
        description: token.description().to_string(),
        expires_at: token.issued_at() + ttl,
    };
    state.hold_confirmation(token);
    Ok(Json(response))
}

async fn restore(
    admin: AdminClaims,
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> ApiResult<Json<RestoreReport>> {
    let confirmation = state
        .take_confirmation(token)
        .ok_or_else(|| ApiError::NotFound(format!("confirmation {token} is unknown or expired")))?;
    tracing::warn!(user = %admin.sub, backup = %confirmation.backup(), "Restore confirmed");
    Ok(Json(state.archiver().restore_backup(confirmation).await?))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use site_admin_core::store::memory::Fault;

    use crate::routes::test_support::{get, post, test_config, TestApp};

    #[tokio::test]
    async fn requires_bearer_token() {
        let app = TestApp::new();
        let (status, body) = app.send(get("/v1/backups", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], json!("unauthorized"));

        let (status, _) = app.send(get("/v1/backups", Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_admin_role_is_forbidden() {
        let app = TestApp::new();
        let token = app.token_with_role("editor");
        let (status, _) = app.send(get("/v1/backups", Some(token.as_str()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn backup_then_confirmed_restore() {
        let app = TestApp::new();
        let token = app.admin_token();
        app.partitions
            .seed("pages", vec![json!({"id": 1, "title": "Home"})])
            .await;

        let (status, created) = app.send(post("/v1/backups", Some(token.as_str()))).await;
        assert_eq!(status, StatusCode::CREATED);
        let name = created["name"].as_str().unwrap().to_string();

        let (_, listed) = app.send(get("/v1/backups", Some(token.as_str()))).await;
        assert_eq!(listed[0]["name"], json!(name));

        app.partitions.seed("pages", vec![json!({"id": 2})]).await;

        let (status, confirmation) = app
            .send(post(&format!("/v1/backups/{name}/confirmations"), Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::OK);
        let confirm = confirmation["token"].as_str().unwrap().to_string();
        assert!(confirmation["description"].as_str().unwrap().contains(&name));

        let (status, report) = app
            .send(post(&format!("/v1/restores/{confirm}"), Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["backup"], json!(name));
        assert_eq!(
            app.partitions.records("pages").await.unwrap(),
            vec![json!({"id": 1, "title": "Home"})]
        );

        // A confirmation is good for one restore only.
        let (status, _) = app
            .send(post(&format!("/v1/restores/{confirm}"), Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_backup_confirmation_is_404() {
        let app = TestApp::new();
        let token = app.admin_token();
        let (status, body) = app
            .send(post("/v1/backups/backup-nope.json/confirmations", Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], json!("notFound"));
    }

    #[tokio::test]
    async fn expired_confirmation_is_refused() {
        let mut config = test_config();
        config.confirmation_ttl = Duration::ZERO;
        let app = TestApp::with_config(config);
        let token = app.admin_token();

        let (_, created) = app.send(post("/v1/backups", Some(token.as_str()))).await;
        let name = created["name"].as_str().unwrap().to_string();
        let (_, confirmation) = app
            .send(post(&format!("/v1/backups/{name}/confirmations"), Some(token.as_str())))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let confirm = confirmation["token"].as_str().unwrap();
        let (status, _) = app
            .send(post(&format!("/v1/restores/{confirm}"), Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_fetch_reports_partition() {
        let app = TestApp::new();
        let token = app.admin_token();
        app.partitions.inject_fault("pages", Fault::Reads).await;

        let (status, body) = app.send(post("/v1/backups", Some(token.as_str()))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], json!("backupFailed"));
        assert_eq!(body["error"]["partition"], json!("pages"));
    }

    #[tokio::test]
    async fn corrupted_backup_is_unprocessable() {
        let app = TestApp::new();
        let token = app.admin_token();
        app.blobs
            .put_at("backups", "backup-bad.json", b"nope".to_vec(), chrono::Utc::now())
            .await;

        let (_, confirmation) = app
            .send(post("/v1/backups/backup-bad.json/confirmations", Some(token.as_str())))
            .await;
        let confirm = confirmation["token"].as_str().unwrap();
        let (status, body): (StatusCode, Value) = app
            .send(post(&format!("/v1/restores/{confirm}"), Some(token.as_str())))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["type"], json!("invalidArchiveFormat"));
    }
}
