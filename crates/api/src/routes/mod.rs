pub mod backups;
pub mod content;
pub mod events;
pub mod health;
pub mod images;
pub mod records;
pub mod site;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(backups::routes())
        .merge(content::routes())
        .merge(events::routes())
        .merge(records::routes())
        .merge(images::routes())
        .merge(site::routes())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::Value;
    use site_admin_core::config::StoreConfig;
    use site_admin_core::events::bus::EventBus;
    use site_admin_core::store::memory::{MemoryBlobStore, MemoryPartitionStore};
    use tower::ServiceExt;

    use crate::auth::{AdminClaims, ADMIN_ROLE};
    use crate::config::AppConfig;
    use crate::state::AppState;

    pub const PARTITIONS: &[&str] = &["site_content", "site_settings", "pages", "social_links"];
    /// Editable partitions kept outside the backup scope in tests.
    pub const UNARCHIVED: &[&str] = &["projects", "services"];

    pub fn test_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreConfig {
                database_url: "postgres://unused".into(),
                db_max_connections: 1,
                db_min_connections: 0,
                partitions: PARTITIONS.iter().map(|p| p.to_string()).collect(),
                bucket: "backups".into(),
                remote_timeout: Duration::from_secs(5),
                image_bucket: "img".into(),
                image_folder: "public".into(),
                image_public_base_url: Some("https://cdn.example.com/storage".into()),
            },
            jwt_secret: "test-secret".into(),
            event_bus_capacity: 16,
            confirmation_ttl: Duration::from_secs(60),
            max_body_bytes: 1024 * 1024,
            log_level: "debug".into(),
        }
    }

    pub struct TestApp {
        pub state: AppState,
        pub partitions: Arc<MemoryPartitionStore>,
        pub blobs: Arc<MemoryBlobStore>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::with_config(test_config())
        }

        pub fn with_config(config: AppConfig) -> Self {
            let partitions = Arc::new(MemoryPartitionStore::new(
                PARTITIONS.iter().chain(UNARCHIVED).copied(),
            ));
            let blobs = Arc::new(MemoryBlobStore::new());
            let state = AppState::new(config, partitions.clone(), blobs.clone(), EventBus::new(16));
            Self {
                state,
                partitions,
                blobs,
            }
        }

        pub fn token_with_role(&self, role: &str) -> String {
            let claims = AdminClaims {
                sub: "owner@example.com".into(),
                role: role.into(),
                exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            };
            encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(self.state.config().jwt_secret.as_bytes()),
            )
            .unwrap()
        }

        pub fn admin_token(&self) -> String {
            self.token_with_role(ADMIN_ROLE)
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = super::build_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        request(Method::GET, uri, token, None)
    }

    pub fn post(uri: &str, token: Option<&str>) -> Request<Body> {
        request(Method::POST, uri, token, None)
    }
}
