//! Caller-visible error taxonomy.
//!
//! Every failure a handler can return is an [`ApiError`]. The JSON body is
//! always `{"error": <message>, "kind": <kind>}`, except for downstream
//! passthrough where the dependency's own status and body are returned as-is.

use axum::{
    Json,
    body::{Body, Bytes},
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::directory::DirectoryError;
use crate::forwarder::ForwardError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation (409).
    #[error("{0}")]
    Conflict(String),

    /// Persistence fault (500).
    #[error("store error: {0}")]
    Store(String),

    /// Downstream dependency unreachable or unusable (500).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Downstream answered with an error status; relayed verbatim.
    #[error("downstream responded with {status}")]
    Downstream {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    /// Fault inside the gateway itself (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Unrecognized route (404).
    #[error("Route not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Upstream(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Downstream { status, .. } => *status,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Store(_) => "store",
            Self::Upstream(_) => "upstream",
            Self::Downstream { .. } => "downstream",
            Self::Internal(_) => "internal",
            Self::NotFound => "not_found",
        }
    }

    /// Message shown to the caller. Server-side faults never expose detail.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
            Self::NotFound => self.to_string(),
            Self::Store(_) | Self::Upstream(_) | Self::Internal(_) | Self::Downstream { .. } => {
                INTERNAL_MESSAGE.to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let Self::Downstream {
            content_type, body, ..
        } = self
        {
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            if let Some(content_type) = content_type {
                response.headers_mut().insert(CONTENT_TYPE, content_type);
            }
            return response;
        }

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let body = json!({
            "error": self.public_message(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(msg) => Self::Validation(msg),
            DirectoryError::Conflict => {
                Self::Conflict("User with this email already exists".to_string())
            }
            DirectoryError::Store(e) => Self::Store(e.to_string()),
        }
    }
}

impl From<ForwardError> for ApiError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Validation(msg) => Self::Validation(msg),
            ForwardError::Downstream {
                status,
                content_type,
                body,
            } => Self::Downstream {
                status,
                content_type,
                body,
            },
            e @ (ForwardError::Unreachable(_) | ForwardError::InvalidResponse(_)) => {
                Self::Upstream(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_body_carries_message_and_kind() {
        let response = ApiError::Validation("Name and email are required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Name and email are required");
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn test_server_errors_hide_detail() {
        let response = ApiError::Store("connection reset by 10.0.0.7".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], INTERNAL_MESSAGE);
        assert_eq!(body["kind"], "store");
        assert!(!body.to_string().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_downstream_passthrough_is_verbatim() {
        let response = ApiError::Downstream {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from_static(br#"{"error":"bad values"}"#),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&bytes[..], br#"{"error":"bad values"}"#);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }
}
