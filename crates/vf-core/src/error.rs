//! # AppError
//!
//! Centralized error handling for Verde Forum.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, Comment, Category)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., title too short, reply nesting too deep)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Missing or invalid session
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but not allowed (e.g., banned, editing someone else's comment)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Infrastructure failure (e.g., database unavailable)
    #[error("internal service error: {0}")]
    Internal(String),

    /// Resource already exists (e.g., duplicate username or email)
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound(kind.to_string(), id.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

/// A specialized Result type for Verde Forum logic.
pub type Result<T> = std::result::Result<T, AppError>;
