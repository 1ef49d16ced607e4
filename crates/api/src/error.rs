use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use site_admin_core::archive::{ArchiveError, BackupFailure};
use site_admin_core::document::collection::RecordError;
use site_admin_core::media::MediaError;
use site_admin_core::store::StoreError;

/// API error type that maps to JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut partition = None;
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "notFound", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "badRequest", msg.clone()),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Archive(err) => {
                partition = err.partition().map(str::to_string);
                let (status, error_type) = match err {
                    ArchiveError::NotFound(_) => (StatusCode::NOT_FOUND, "notFound"),
                    ArchiveError::InvalidArchiveFormat(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalidArchiveFormat")
                    }
                    ArchiveError::BackupFailed(BackupFailure::UploadCollision(_)) => {
                        (StatusCode::CONFLICT, "uploadCollision")
                    }
                    ArchiveError::BackupFailed(_) => (StatusCode::BAD_GATEWAY, "backupFailed"),
                    ArchiveError::RestoreFailed { .. } => (StatusCode::BAD_GATEWAY, "restoreFailed"),
                    ArchiveError::ConnectionUnavailable(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "connectionUnavailable")
                    }
                };
                (status, error_type, err.to_string())
            }
            ApiError::Store(err) | ApiError::Record(RecordError::Store(err)) => {
                tracing::error!("Store error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internalError",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::Record(err) => {
                let (status, error_type) = match err {
                    RecordError::NotAnObject => (StatusCode::BAD_REQUEST, "badRequest"),
                    RecordError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
                    _ => (StatusCode::UNPROCESSABLE_ENTITY, "invalidRecord"),
                };
                (status, error_type, err.to_string())
            }
            ApiError::Media(err) => {
                let (status, error_type) = match err {
                    MediaError::NotAnImage(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "notAnImage"),
                    MediaError::InvalidName(_) | MediaError::OutsideFolder(_) => {
                        (StatusCode::BAD_REQUEST, "badRequest")
                    }
                    MediaError::AlreadyExists(_) => (StatusCode::CONFLICT, "alreadyExists"),
                    MediaError::NotFound(_) => (StatusCode::NOT_FOUND, "notFound"),
                    MediaError::Store(err) => {
                        tracing::error!("Image storage error: {err}");
                        (StatusCode::BAD_GATEWAY, "storageUnavailable")
                    }
                };
                (status, error_type, err.to_string())
            }
        };

        let mut body = json!({
            "error": {
                "type": error_type,
                "message": message,
                "statusCode": status.as_u16(),
            }
        });
        if let Some(partition) = partition {
            body["error"]["partition"] = json!(partition);
        }

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
