//! Application-level error taxonomy shared by every layer.

use thiserror::Error;

/// Errors surfaced to API callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Bad input, detected before any side effect
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Cross-tenant access
    #[error("{0}")]
    Permission(String),

    /// A share or link that existed but has expired
    #[error("{0}")]
    Gone(String),

    /// LLM, email, storage or database provider failure
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn gone(msg: impl Into<String>) -> Self {
        Self::Gone(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Permission(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Gone(_) => 410,
            AppError::Upstream(_) => 500,
            AppError::Internal(_) => 500,
        }
    }

    /// Get error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Permission(_) => "PERMISSION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Gone(_) => "GONE",
            AppError::Upstream(_) => "UPSTREAM_SERVICE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
