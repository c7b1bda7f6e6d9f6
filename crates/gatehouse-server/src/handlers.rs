use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

pub async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "message": "Welcome to the Gatehouse API!" })),
    )
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.health.check().await {
        Ok(report) => (report.status_code(), Json(report)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "Health check failed" })),
            )
                .into_response()
        }
    }
}

pub async fn metrics() -> Response {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, crate::metrics::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        None => ApiError::Internal("metrics recorder not installed".to_string()).into_response(),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let user = state
        .directory
        .create_user(req.name.as_deref(), req.email.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "userId": user.id,
        })),
    ))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.directory.list_users().await?;
    Ok((StatusCode::OK, Json(users)))
}

pub async fn process(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let result = state.forwarder.forward(&body).await?;
    Ok((StatusCode::OK, Json(result)))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
