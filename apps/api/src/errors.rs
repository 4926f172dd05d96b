use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Validation errors (`NotFound`, `InvalidState`, `MalformedInput`) are raised
/// before any external capability is invoked. Collaborator failures are
/// transient from the caller's perspective; the service itself never retries.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Collaborator blocked the request: {0}")]
    CollaboratorBlocked(String),

    #[error("Collaborator returned a degenerate reply: {0}")]
    CollaboratorDegenerate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            AppError::MalformedInput(msg) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_INPUT", msg.clone())
            }
            AppError::CollaboratorUnavailable(msg) => {
                tracing::error!("Collaborator unavailable: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "COLLABORATOR_UNAVAILABLE",
                    "The AI backend is unreachable".to_string(),
                )
            }
            AppError::CollaboratorBlocked(msg) => {
                tracing::warn!("Collaborator blocked: {msg}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "COLLABORATOR_BLOCKED",
                    "The AI backend rejected the content".to_string(),
                )
            }
            AppError::CollaboratorDegenerate(msg) => {
                tracing::warn!("Collaborator degenerate reply: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "COLLABORATOR_DEGENERATE",
                    "The AI backend returned an unusable reply".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
