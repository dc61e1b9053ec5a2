//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use enrichkit_shared::EnrichKitError;

/// Error type returned by every handler.
///
/// Serializes as `{"error": ..., "details"?: ...}`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    /// A domain error from the enrichkit crates.
    #[error(transparent)]
    Core(#[from] EnrichKitError),

    /// The request body or query string could not be decoded.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Core(core) => match core {
                EnrichKitError::Validation { message } => {
                    (StatusCode::BAD_REQUEST, message.clone(), None)
                }
                EnrichKitError::Config { .. } => {
                    tracing::error!(error = %core, "request rejected: service misconfigured");
                    (StatusCode::INTERNAL_SERVER_ERROR, core.to_string(), None)
                }
                EnrichKitError::AuditWrite(details) => {
                    tracing::error!(error = %details, "enrichment log not written");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to write enrichment log".to_string(),
                        Some(details.clone()),
                    )
                }
                other => {
                    tracing::error!(error = %other, "unhandled error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        Some(other.to_string()),
                    )
                }
            },
        };

        let body = match details {
            Some(details) => json!({ "error": error, "details": details }),
            None => json!({ "error": error }),
        };

        (status, Json(body)).into_response()
    }
}
