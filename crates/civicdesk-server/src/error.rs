//! HTTP rendering of domain errors.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use civicdesk_core::error::CivicError;
use serde::Serialize;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Error type returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub CivicError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    status: u16,
    message: String,
    error: ErrorBody,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self(CivicError::validation("INVALID_REQUEST", message))
    }
}

impl From<CivicError> for ApiError {
    fn from(err: CivicError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let (message, details) = if err.is_internal() {
            tracing::error!(error = %err, "Request failed");
            (INTERNAL_MESSAGE.to_string(), None)
        } else {
            let details = match &err {
                CivicError::InvalidPincode { field, value } => Some(format!("{field}: {value}")),
                CivicError::AccountLocked { until } => Some(until.to_rfc3339()),
                CivicError::DuplicateEntry { field } => Some(field.clone()),
                _ => None,
            };
            (err.to_string(), details)
        };

        let body = ErrorEnvelope {
            success: false,
            status: status.as_u16(),
            message,
            error: ErrorBody {
                code: err.code(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
