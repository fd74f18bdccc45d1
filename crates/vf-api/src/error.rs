//! Maps `AppError` onto HTTP responses with a `{error: {code, message}}` body.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use vf_core::error::AppError;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn code(&self) -> &'static str {
        match &self.0 {
            AppError::NotFound(..) => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal",
        }
    }

    /// Message safe to show to clients; internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match &self.0 {
            AppError::Internal(_) => "internal server error".to_string(),
            AppError::ValidationError(message)
            | AppError::Unauthorized(message)
            | AppError::Forbidden(message)
            | AppError::Conflict(message) => message.clone(),
            AppError::NotFound(kind, _) => format!("{kind} not found"),
        }
    }

    pub fn body(&self) -> serde_json::Value {
        json!({ "error": { "code": self.code(), "message": self.public_message() } })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self(error)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
