// Authentication-specific errors for the auth engine and the request authenticator

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::repository::StoreError;
use crate::utils::password::PasswordError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account temporarily locked until {}", .locked_until.to_rfc3339())]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("account not verified")]
    AccountNotVerified,

    #[error("missing or malformed session token")]
    MissingToken,

    #[error("missing user id")]
    MissingUserId,

    #[error("User-ID mismatch")]
    UserIdMismatch,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("email or phone already registered")]
    AlreadyRegistered,

    #[error("user already verified")]
    AlreadyVerified,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid verification code")]
    InvalidVerification,

    #[error("verification code expired")]
    VerificationExpired,

    #[error("verification recently sent")]
    ResendTooSoon,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::AccountLocked { .. }
            | AuthError::AccountNotVerified
            | AuthError::MissingToken
            | AuthError::MissingUserId
            | AuthError::UserIdMismatch
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_)
            | AuthError::InvalidVerification
            | AuthError::VerificationExpired
            | AuthError::ResendTooSoon => StatusCode::BAD_REQUEST,
            AuthError::AlreadyRegistered | AuthError::AlreadyVerified => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::AccountNotVerified => "ACCOUNT_NOT_VERIFIED",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::MissingUserId => "MISSING_USER_ID",
            AuthError::UserIdMismatch => "USER_ID_MISMATCH",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::AlreadyRegistered => "ALREADY_REGISTERED",
            AuthError::AlreadyVerified => "ALREADY_VERIFIED",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InvalidVerification => "INVALID_VERIFICATION",
            AuthError::VerificationExpired => "VERIFICATION_EXPIRED",
            AuthError::ResendTooSoon => "RESEND_TOO_SOON",
            AuthError::Password(_) => "PASSWORD_ERROR",
            AuthError::Store(_) => "STORE_ERROR",
        }
    }

    /// Failures that count against the login attempt counter
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials | AuthError::AccountNotVerified
        )
    }
}

/// Log an authentication failure with structured fields
pub fn log_auth_failure(email: &str, error: &AuthError) {
    tracing::warn!(
        email = email,
        error_code = error.error_code(),
        "Authentication failure"
    );
}
