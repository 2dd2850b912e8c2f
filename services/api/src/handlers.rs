//! Axum Handlers for the REST API
//!
//! Health, session listing and the alert intake. It uses `utoipa` doc
//! comments to generate OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::state::AppState;

/// Body of every error response.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

/// Keys of the sessions that currently have an owner socket.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct SessionList {
    pub sessions: Vec<String>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Errors a handler can answer with.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List the keys of all live sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Live session keys", body = SessionList)
    )
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionList> {
    Json(SessionList {
        sessions: state.sessions.session_keys().await,
    })
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = StatusResponse)
    )
)]
pub async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// Receive an alert from the monitoring stack and log it.
#[utoipa::path(
    post,
    path = "/alerts",
    request_body(content = Object, description = "Arbitrary JSON alert payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Alert logged", body = StatusResponse),
        (status = 400, description = "Body is not JSON", body = ErrorResponse)
    )
)]
pub async fn receive_alert(body: Bytes) -> Result<Json<StatusResponse>, ApiError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Alert body is not valid JSON: {e}")))?;
    info!(alert = %payload, "Received alert");
    Ok(Json(StatusResponse::ok()))
}
