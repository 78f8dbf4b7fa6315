use thiserror::Error;

use crate::auth::{PasswordError, TokenError};
use crate::database::models::QueryRejection;
use crate::database::DatabaseError;

/// Failure kinds shared by the gateway's services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Access denied. No token provided.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid field provided. Only \"username\" or \"password\" can be updated.")]
    InvalidField,

    #[error("{0}")]
    UnauthorizedCommand(String),

    #[error("{0}")]
    QueryExecution(String),

    #[error("Storage did not respond in time")]
    StorageTimeout,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Timeout(limit) => {
                tracing::error!("Storage call exceeded {:?}", limit);
                ServiceError::StorageTimeout
            }
            DatabaseError::InvalidParam(msg) => ServiceError::InvalidFormat(msg),
            other => {
                tracing::error!("Storage error: {}", other);
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => ServiceError::Internal(msg),
            other => {
                tracing::warn!("Token verification failed: {}", other);
                ServiceError::Forbidden("Invalid token".to_string())
            }
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(err: QueryRejection) -> Self {
        match err {
            QueryRejection::MissingSql | QueryRejection::NonScalarParam { .. } => {
                ServiceError::InvalidFormat(err.to_string())
            }
            QueryRejection::UnauthorizedCommand(_) | QueryRejection::MultipleStatements => {
                ServiceError::UnauthorizedCommand(err.to_string())
            }
        }
    }
}
