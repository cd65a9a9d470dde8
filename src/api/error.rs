//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CustodyError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Custody(#[from] CustodyError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
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

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub(crate) fn status_for(err: &CustodyError) -> StatusCode {
    match err {
        CustodyError::NotFound { .. } => StatusCode::NOT_FOUND,
        CustodyError::Forbidden { .. } | CustodyError::SelfReviewForbidden { .. } => {
            StatusCode::FORBIDDEN
        }
        CustodyError::StaleCount { .. }
        | CustodyError::ConcurrentModification { .. }
        | CustodyError::AlreadyDecided { .. }
        | CustodyError::AlreadyResolved(_)
        | CustodyError::InvalidState(_) => StatusCode::CONFLICT,
        CustodyError::EmptyAudit
        | CustodyError::InvalidMedication { .. }
        | CustodyError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CustodyError::Database(_) | CustodyError::LockPoisoned => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Custody(err) => {
                let status = status_for(err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "API internal error");
                }
                (status, err.code(), err.user_message())
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}
