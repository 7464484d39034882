//! Error types for the annotation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::migrate::LoadError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Load rejected: {0}")]
    Load(#[from] LoadError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Load(e) => {
                tracing::warn!("Save file rejected: {}", e);
                match e {
                    LoadError::UnsupportedVersion { .. } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "unsupported_version",
                        e.to_string(),
                    ),
                    _ => (StatusCode::BAD_REQUEST, "invalid_save_file", e.to_string()),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = AppError::NotFound("Record not found: x".into()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let load = AppError::from(LoadError::MissingKey("file_names")).into_response();
        assert_eq!(load.status(), StatusCode::BAD_REQUEST);

        let version = AppError::from(LoadError::UnsupportedVersion {
            found: "3".into(),
            supported: 2,
        })
        .into_response();
        assert_eq!(version.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
