//! Authentication Error Types

use thiserror::Error;

use crate::db::StoreError;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong email/password).
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("User not found")]
    UserNotFound,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User already exists (registration, email change, rename).
    #[error("Username or email already taken")]
    UserAlreadyExists,

    /// Caller lacks the required permission.
    #[error("Permission denied")]
    Forbidden,

    /// Validation error.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Password hashing error.
    #[error("Password processing failed")]
    PasswordHash,

    /// Storage error.
    #[error("Storage error")]
    Store(#[from] StoreError),

    /// JWT error.
    #[error("Token error")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Map a unique-constraint conflict to [`AuthError::UserAlreadyExists`].
    pub(crate) fn from_account_write(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => Self::UserAlreadyExists,
            other => Self::Store(other),
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
