use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::workflow::WorkflowError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart body the extractor refused; carries the status it chose.
    #[error("Upload rejected ({status}): {message}")]
    Upload { status: StatusCode, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("History query error: {0}")]
    HistoryQuery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Storage(e) => AppError::Storage(e.to_string()),
            WorkflowError::HistoryQuery(e) => AppError::HistoryQuery(e.to_string()),
            WorkflowError::Recording(msg) => AppError::Internal(msg),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::Upload {
            status: e.status(),
            message: format!("Malformed upload: {}", e.body_text()),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Upload { status, message } => {
                let code = if *status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "VALIDATION_ERROR"
                };
                (*status, code, message.clone())
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORAGE_ERROR",
                    "The image could not be stored; nothing was recorded".to_string(),
                )
            }
            AppError::HistoryQuery(msg) => {
                tracing::error!("History query error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "HISTORY_QUERY_ERROR",
                    "Analysis history is unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "The submission could not be completed".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
