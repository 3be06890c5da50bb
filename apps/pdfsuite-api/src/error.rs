//! Error types for the pdfsuite server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfsuite_core::ValidationError;
use pdfsuite_ops::PdfOpsError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unknown bucket: {bucket} (this server stores files in '{served}')")]
    UnknownBucket { bucket: String, served: String },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Processing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body; also readable as a failed function response
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ServerError::InvalidPath(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_PATH", self.to_string())
            }
            ServerError::UnknownBucket { .. } => {
                (StatusCode::NOT_FOUND, "UNKNOWN_BUCKET", self.to_string())
            }
            ServerError::UnknownFunction(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_FUNCTION", self.to_string())
            }
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ServerError::IncorrectPassword => (
                StatusCode::BAD_REQUEST,
                "INCORRECT_PASSWORD",
                self.to_string(),
            ),
            ServerError::Unsupported(msg) => (
                StatusCode::NOT_IMPLEMENTED,
                "UNSUPPORTED_OPERATION",
                msg.clone(),
            ),
            ServerError::Processing(msg) => {
                tracing::warn!("Processing failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROCESSING_ERROR",
                    msg.clone(),
                )
            }
            ServerError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Storage error".to_string(),
                )
            }
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PdfOpsError> for ServerError {
    fn from(err: PdfOpsError) -> Self {
        match err {
            PdfOpsError::Unsupported(_) => ServerError::Unsupported(err.to_string()),
            PdfOpsError::IncorrectPassword => ServerError::IncorrectPassword,
            other => ServerError::Processing(other.to_string()),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(err: ValidationError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}
