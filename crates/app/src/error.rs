//! API and startup error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use services::{BridgeError, BridgeServicesError, ProgressServiceError};

use crate::config::{ArgsError, ConfigError};

/// Startup errors for the server binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error(transparent)]
    Args(#[from] ArgsError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("service startup failed: {0}")]
    Services(#[from] BridgeServicesError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// Request-level failures, rendered as JSON.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Progress(ProgressServiceError::UnknownActivity(_))
            | ApiError::Bridge(BridgeError::UnknownActivity(_)) => {
                (StatusCode::NOT_FOUND, "activity_not_found")
            }
            ApiError::Progress(ProgressServiceError::UnknownCourse(_)) => {
                (StatusCode::NOT_FOUND, "course_not_found")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "progress storage is unavailable".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}
