//! API error types with HTTP response mapping.

use application::WebhookError;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorCode};
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
///
/// Every variant renders as `{ "code", "message", "context" }`.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by a use case or repository.
    Domain(DomainError),
    /// Malformed request body, path or form field.
    BadRequest(String),
    /// Missing or invalid identity headers.
    Unauthorized(String),
    /// Payment webhook that failed verification or parsing.
    Webhook(WebhookError),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String, Value) {
        match self {
            ApiError::Domain(err) => {
                let status = match err.code {
                    ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
                    ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
                    ErrorCode::Conflict => StatusCode::CONFLICT,
                    ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code.as_str(), err.message, err.context)
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError.as_str(),
                message,
                Value::Null,
            ),
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, Value::Null)
            }
            ApiError::Webhook(err) => (
                StatusCode::BAD_REQUEST,
                "INVALID_WEBHOOK",
                err.to_string(),
                Value::Null,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, context) = self.parts();

        if status.is_server_error() {
            tracing::error!(%code, error = %message, %context, "request failed");
        } else {
            tracing::debug!(%code, error = %message, "request rejected");
        }

        let body = json!({ "code": code, "message": message, "context": context });
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}
