//! Error types for ttx-server
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Business-rule rejections (gates closed, duplicate answers,
//! capacity reached) are expected outcomes returned to the caller, never
//! logged as system failures; only infrastructure variants are faults.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for ttx-server
#[derive(Error, Debug)]
pub enum Error {
    /// Requested exercise/inject/phase/participant missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not the owning facilitator / the claimed participant
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Submission attempted while responses are closed
    #[error("Responses not open: {0}")]
    NotOpen(String),

    /// Phase advance attempted while progression is locked
    #[error("Phase progression locked: {0}")]
    Locked(String),

    /// Re-answer attempt for an already-recorded question
    #[error("Response already submitted: {0}")]
    DuplicateResponse(String),

    /// State transition that would not change anything meaningful
    /// (e.g. re-releasing an already-active inject)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Join attempt over the exercise participant limit
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Operation not valid for the entity's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Transient infrastructure failure surfaced to the caller
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status for the API surface
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAuthorized(_) | Error::Locked(_) => StatusCode::FORBIDDEN,
            Error::NotOpen(_) | Error::CapacityExceeded(_) | Error::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::DuplicateResponse(_) | Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_) | Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True for infrastructure faults worth logging at error level
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Database(_)
                | Error::Io(_)
                | Error::Internal(_)
                | Error::Unavailable(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_fault() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(json!({ "message": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

/// Convenience Result type using ttx-server Error
pub type Result<T> = std::result::Result<T, Error>;
