use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shorty_core::ShortenerError;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

pub const EMPTY_BODY_MESSAGE: &str = "empty request body";
pub const EMPTY_CODE_MESSAGE: &str = "empty short code";
pub const NOT_FOUND_MESSAGE: &str = "the requested short code not found";

/// Errors returned by the HTTP handlers, rendered as plain-text bodies.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound,
    MethodNotAllowed,
    Internal(String),
}

impl From<ShortenerError> for AppError {
    fn from(value: ShortenerError) -> Self {
        match value {
            ShortenerError::InvalidInput(message) => AppError::BadRequest(message),
            ShortenerError::NotFound(_) => AppError::NotFound,
            ShortenerError::BackendUnavailable(message) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            AppError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response(),
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            AppError::Internal(message) => {
                error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
