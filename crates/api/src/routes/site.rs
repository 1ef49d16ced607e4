//! Public reads for the rendered site. No token required.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use site_admin_core::document::collection::{PAGES, PROJECTS, SERVICES, SOCIAL_LINKS};
use site_admin_core::document::styles::ThemeStyles;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/site/styles", get(get_styles))
        .route("/v1/site/pages", get(list_pages))
        .route("/v1/site/pages/{slug}", get(get_page))
        .route("/v1/site/{partition}", get(list_visible))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StylesResponse {
    styles: ThemeStyles,
    css_variables: BTreeMap<&'static str, String>,
}

async fn get_styles(State(state): State<AppState>) -> ApiResult<Json<StylesResponse>> {
    let styles = ThemeStyles::load(state.partitions())
        .await?
        .ok_or_else(|| ApiError::NotFound("no site styles configured".into()))?;
    Ok(Json(StylesResponse {
        css_variables: styles.css_variables().into_iter().collect(),
        styles,
    }))
}

async fn list_pages(State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    Ok(Json(PAGES.list_visible(state.partitions()).await?))
}

async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Value>> {
    PAGES
        .list_visible(state.partitions())
        .await?
        .into_iter()
        .find(|page| page.get("slug").and_then(Value::as_str) == Some(slug.as_str()))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("page `{slug}` not found")))
}

async fn list_visible(
    State(state): State<AppState>,
    Path(partition): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    let collection = [&PROJECTS, &SERVICES, &SOCIAL_LINKS]
        .into_iter()
        .find(|c| c.partition == partition)
        .ok_or_else(|| ApiError::NotFound(format!("no public collection `{partition}`")))?;
    Ok(Json(collection.list_visible(state.partitions()).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{get, TestApp};

    #[tokio::test]
    async fn styles_come_with_css_fallbacks() {
        let app = TestApp::new();
        let (status, _) = app.send(get("/v1/site/styles", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.partitions
            .seed(
                "site_content",
                vec![json!({"language": "en", "content": {"styles": {
                    "primaryColor": "#0ea5e9", "secondaryColor": "#f97316", "fontFamily": "Inter"
                }}})],
            )
            .await;
        let (status, body) = app.send(get("/v1/site/styles", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["styles"]["fontFamily"], json!("Inter"));
        assert_eq!(body["cssVariables"]["--title-color"], json!("#0ea5e9"));
        assert_eq!(body["cssVariables"]["--color-text"], json!("#c6d3e2"));
    }

    #[tokio::test]
    async fn only_published_pages_are_public() {
        let app = TestApp::new();
        app.partitions
            .seed(
                "pages",
                vec![
                    json!({"id": "1", "title": "Live", "slug": "live", "is_published": true}),
                    json!({"id": "2", "title": "Draft", "slug": "draft", "is_published": false}),
                ],
            )
            .await;

        let (status, pages) = app.send(get("/v1/site/pages", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pages, json!([{"id": "1", "title": "Live", "slug": "live", "is_published": true}]));

        let (status, _) = app.send(get("/v1/site/pages/draft", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, page) = app.send(get("/v1/site/pages/live", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["title"], json!("Live"));
    }

    #[tokio::test]
    async fn services_are_listed_in_order() {
        let app = TestApp::new();
        app.partitions
            .seed(
                "services",
                vec![
                    json!({"id": "b", "title": "Hosting", "sort_order": 1}),
                    json!({"id": "a", "title": "Design", "sort_order": 0}),
                ],
            )
            .await;
        let (status, services) = app.send(get("/v1/site/services", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(services[0]["title"], json!("Design"));

        let (status, _) = app.send(get("/v1/site/site_settings", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
