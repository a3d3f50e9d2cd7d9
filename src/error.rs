use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::models::ErrorResponse;

/// AppError
///
/// The failure taxonomy shared by the workflow, the repository and the HTTP surface.
/// Every variant is scoped to a single request; none of them is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or out-of-range input. No mutation has happened.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The actor lacks the role or ownership the operation requires.
    #[error("{0}")]
    Forbidden(String),

    /// The referenced record or user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A failure reported by the record store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failure reported by the file storage backend.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used by handlers and services.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The HTTP status and stable error code for this failure.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let detail = match &self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                "An internal error occurred".to_string()
            }
            AppError::Storage(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            detail,
            error_code: Some(code.to_string()),
            timestamp: Utc::now(),
        };

        (status, Json(body)).into_response()
    }
}

// Extractor rejections carry axum's own message (e.g. "missing field `status`").

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("invalid path: {}", rejection.body_text()))
    }
}

/// True when a sqlx error is a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
