//! Authentication error types.

use chrono::{DateTime, Utc};
use civicdesk_core::error::CivicError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked until {0}")]
    AccountLocked(DateTime<Utc>),

    #[error("account is deactivated")]
    AccountDeactivated,

    #[error("e-mail address is not verified")]
    EmailNotVerified,

    #[error("e-mail address is already verified")]
    AlreadyVerified,

    #[error("invalid or expired verification token")]
    VerificationTokenInvalid,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("too many login attempts")]
    RateLimited,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CivicError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => CivicError::InvalidCredentials,
            AuthError::AccountLocked(until) => CivicError::AccountLocked { until },
            AuthError::AccountDeactivated => CivicError::AccountDeactivated,
            AuthError::EmailNotVerified => CivicError::EmailNotVerified,
            AuthError::AlreadyVerified => {
                CivicError::validation("ALREADY_VERIFIED", err.to_string())
            }
            AuthError::VerificationTokenInvalid => {
                CivicError::validation("INVALID_VERIFICATION_TOKEN", err.to_string())
            }
            AuthError::WeakPassword(_) => CivicError::validation("WEAK_PASSWORD", err.to_string()),
            AuthError::RateLimited => CivicError::RateLimited,
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => CivicError::Unauthenticated {
                reason: err.to_string(),
            },
            AuthError::Crypto(msg) => CivicError::Internal(msg),
        }
    }
}
