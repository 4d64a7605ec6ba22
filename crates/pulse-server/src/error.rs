//! Error types for the Pulse API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can
//! be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. All
//! responses carry a JSON body with `error` and `status` fields; rate
//! limit responses additionally carry `retry_after_seconds`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulse_core::PopulationError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request input failed validation. State is unchanged.
    #[error("validation error: {0}")]
    Validation(String),

    /// The administrative credential was missing or wrong.
    #[error("invalid or missing admin credential")]
    Unauthorized,

    /// The client exceeded the configured submission rate.
    #[error("rate limit exceeded, retry in {retry_after_seconds}s")]
    RateLimited {
        /// Seconds until the client's window resets.
        retry_after_seconds: u64,
    },

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PopulationError> for ApiError {
    fn from(error: PopulationError) -> Self {
        match error {
            PopulationError::UnknownTerritory { name } => {
                Self::NotFound(format!("unknown territory: {name}"))
            }
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::RateLimited {
                retry_after_seconds,
            } => serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
                "retry_after_seconds": retry_after_seconds,
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
