use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// How a domain failure is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input. Never retried, never logged as an error.
    Validation,
    /// Business conflict such as a duplicate name or a full roster.
    Conflict,
    /// Stored data contradicts itself. Fatal for the operation.
    Consistency,
    /// Store timeout or outage. The caller may retry the whole operation.
    Unavailable,
}

/// Implemented by every service error so handlers can route it.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(msg) => ApiError::StoreUnavailable(msg),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    details: Option<String>,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let (status, message) = match self {
            ApiError::InternalServerError(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
            ApiError::BadRequest(_) => (actix_web::http::StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotFound(_) => (actix_web::http::StatusCode::NOT_FOUND, self.to_string()),
            ApiError::StoreUnavailable(_) => (actix_web::http::StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".to_string()),
            ApiError::ValidationError(_) => (actix_web::http::StatusCode::BAD_REQUEST, self.to_string()),
        };

        let error_response = ErrorResponse {
            error: message,
            code: status.as_u16(),
            details: Some(self.to_string()),
        };

        HttpResponse::build(status).json(error_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").error_response().status(), 400);
        assert_eq!(ApiError::not_found("x").error_response().status(), 404);
        assert_eq!(ApiError::internal_error("x").error_response().status(), 500);
        assert_eq!(
            ApiError::from(StoreError::Unavailable("timeout".to_string()))
                .error_response()
                .status(),
            503
        );
    }
}
