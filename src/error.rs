//! Errors shared by the account and catalog services.

use bookswap_db::DbError;
use bookswap_http::AppError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        details: Vec<serde_json::Value>,
        message: String,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] DbError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid(field: &str, error: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            details: vec![json!({ "field": field, "error": error })],
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(DbError::from(err))
    }
}

impl From<bookswap_authz::PasswordError> for ServiceError {
    fn from(err: bookswap_authz::PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<bookswap_authz::TokenError> for ServiceError {
    fn from(err: bookswap_authz::TokenError) -> Self {
        match err {
            bookswap_authz::TokenError::Signing(_) => Self::Internal(err.to_string()),
            _ => Self::Unauthorized(err.to_string()),
        }
    }
}

impl From<bookswap_authz::AdminRequired> for ServiceError {
    fn from(err: bookswap_authz::AdminRequired) -> Self {
        Self::Forbidden(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation { details, message } => AppError::validation(details, message),
            ServiceError::Unauthorized(message) => AppError::unauthorized(message),
            ServiceError::Forbidden(message) => AppError::forbidden(message),
            ServiceError::NotFound(message) => AppError::not_found(message),
            ServiceError::Conflict(message) => AppError::conflict(Vec::new(), message),
            ServiceError::Store(err) => AppError::Internal(err.into()),
            ServiceError::Internal(message) => AppError::Internal(anyhow::anyhow!(message)),
        }
    }
}
