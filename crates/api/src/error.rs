//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::TransitionError;
use store::IntakeError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Store-level error from intake operations.
    Intake(IntakeError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Intake(err) => intake_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn intake_error_to_response(err: IntakeError) -> (StatusCode, String) {
    match &err {
        IntakeError::Validation(_) | IntakeError::AmountOverflow { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        IntakeError::ProductNotFound(_) | IntakeError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        IntakeError::Transition(TransitionError::Forbidden { .. }) => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        IntakeError::Transition(TransitionError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        IntakeError::InsufficientStock { .. } | IntakeError::Conflict { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        IntakeError::Database(_) | IntakeError::Migration(_) => {
            tracing::error!(error = %err, "store error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        ApiError::Intake(err)
    }
}
