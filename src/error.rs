//! Error types for the Claw-X API
//!
//! One enum for handler failures, a status code per
//! variant, and a JSON body shaped like `{ "error": ..., "detail": ... }`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Main error type for request handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Underlying storage rejected or failed the operation
    #[error("{label}: {detail}")]
    Storage { label: String, detail: String },

    /// Anything else; detail is logged, never returned
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Attach an operation label to a store failure
    pub fn storage(label: &str, err: StoreError) -> Self {
        Self::Storage {
            label: label.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation(message) => json!({ "error": message }),
            Self::Storage { label, detail } => json!({ "error": label, "detail": detail }),
            Self::Internal(detail) => {
                error!(detail = %detail, "Unhandled server error");
                json!({ "error": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
