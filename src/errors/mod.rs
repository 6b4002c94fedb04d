//! Error handling module for the proposal board.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const DUPLICATE_VOTE: &str = "DUPLICATE_VOTE";
    pub const REPOSITORY_ERROR: &str = "REPOSITORY_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
///
/// Every variant is recoverable; none of them invalidates the last published
/// proposal list or the form state of a workflow.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Malformed or incomplete local input
    #[error("{0}")]
    Validation(String),
    /// No acting user could be resolved
    #[error("{0}")]
    Unauthenticated(String),
    /// The user already voted for this proposal
    #[error("user {user_id} already voted for proposal {proposal_id}")]
    DuplicateVote {
        proposal_id: String,
        user_id: String,
    },
    /// Resource not found
    #[error("{0}")]
    NotFound(String),
    /// Store or transport failure
    #[error("{0}")]
    Repository(String),
    /// Unreadable request body
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    /// Build a validation error naming the missing fields.
    pub fn missing_fields(fields: &[&str]) -> Self {
        AppError::Validation(format!("missing required field(s): {}", fields.join(", ")))
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::DuplicateVote { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            AppError::DuplicateVote { .. } => codes::DUPLICATE_VOTE,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Repository(_) => codes::REPOSITORY_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Repository(format!("Database error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        ErrorResponse::new(error.error_code(), error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
