use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session not found or expired")]
    SessionNotFoundOrExpired,

    #[error("Invalid participants data: {0}")]
    InvalidParticipants(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "unauthorized", msg)
            }
            ApiError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, "forbidden", msg)
            }
            ApiError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                "session_not_found",
                "session not found".to_string(),
            ),
            // Missing, expired, and disabled sessions all take this branch so
            // anonymous callers cannot probe which of the three it was.
            ApiError::SessionNotFoundOrExpired => (
                StatusCode::NOT_FOUND,
                "session_not_found_or_expired",
                "session not found, expired, or disabled".to_string(),
            ),
            ApiError::InvalidParticipants(msg) => {
                tracing::warn!("Invalid participants data: {}", msg);
                (StatusCode::BAD_REQUEST, "invalid_participants_data", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "bad_request", msg)
            }
            ApiError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "internal storage failure".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
