//! HTTP error mapping for kpi-engine

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kpi_common::Error;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed path, query or body (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Domain error, status chosen by its kind
    #[error(transparent)]
    Domain(#[from] Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let err = match self {
            ApiError::BadRequest(_) => return (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Domain(err) => err,
        };

        match err {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            Error::OverlapViolation { .. } => (StatusCode::CONFLICT, "OVERLAP_VIOLATION"),
            Error::SweepInProgress => (StatusCode::CONFLICT, "SWEEP_IN_PROGRESS"),
            Error::Config(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CONFIGURATION_ERROR"),
            Error::Transport { .. } => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
            Error::InvalidSourceResponse { .. } => (StatusCode::BAD_GATEWAY, "INVALID_SOURCE_RESPONSE"),
            Error::DivisionByZero => (StatusCode::BAD_GATEWAY, "DIVISION_BY_ZERO"),
            Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
