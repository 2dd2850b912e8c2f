//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoints, static pages and OpenAPI
//! documentation.

use crate::{
    handlers::{self, ErrorResponse, SessionList, StatusResponse},
    state::AppState,
    ws::{events_handler, ws_handler},
};

use axum::{
    Router,
    routing::{get, post},
};
use std::{path::Path, sync::Arc};
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_sessions,
        handlers::health,
        handlers::receive_alert,
    ),
    components(
        schemas(SessionList, StatusResponse, ErrorResponse)
    ),
    tags(
        (name = "NPC API", description = "Voice NPC relay and museum guide")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>, static_dir: &Path) -> Router {
    let api_router = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/health", get(handlers::health))
        .route("/alerts", post(handlers::receive_alert))
        .route("/ws/{session_id}", get(ws_handler))
        .route("/ws/{session_id}/events", get(events_handler))
        .with_state(app_state);

    let pages = Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route_service("/viewer", ServeFile::new(static_dir.join("viewer.html")))
        .nest_service("/static", ServeDir::new(static_dir));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .merge(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_http_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["/alerts", "/health", "/sessions"]);
    }
}
