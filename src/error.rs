// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No usable credential: never authorized, or expired with no way to
    /// refresh. The form is simply not active.
    #[error("This form is not active")]
    Inactive,

    #[error("Spreadsheet is missing named range: {0}")]
    MissingNamedRange(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("State store error: {0}")]
    State(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Inactive => (
                StatusCode::SERVICE_UNAVAILABLE,
                "form_not_active",
                Some("This form is not active.".to_string()),
            ),
            AppError::MissingNamedRange(name) => (
                StatusCode::FAILED_DEPENDENCY,
                "missing_named_range",
                Some(format!("Spreadsheet is missing named range: {}", name)),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::GoogleApi(msg) => {
                tracing::error!(error = %msg, "Google API error");
                (StatusCode::BAD_GATEWAY, "google_error", Some(msg.clone()))
            }
            AppError::State(msg) => {
                tracing::error!(error = %msg, "State store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "state_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_maps_to_503() {
        let response = AppError::Inactive.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_missing_named_range_maps_to_424() {
        let response = AppError::MissingNamedRange("Responses".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
    }
}
