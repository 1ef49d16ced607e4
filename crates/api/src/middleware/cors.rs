use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer for the admin panel: JSON bodies and bearer tokens
/// from any origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
