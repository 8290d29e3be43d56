//! # Auth Errors
//!
//! Error types for the authentication module.
//!
//! `Display` carries the diagnostic text that ends up in logs. What the
//! client sees comes from [`AuthError::client_message`], which never says
//! which check failed.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // ==================
    // Credential Errors
    // ==================

    /// Password did not match the stored hash (or the email is unknown)
    #[error("incorrect credentials")]
    IncorrectCredentials,

    /// The password hash could not be compared at all
    #[error("password verification failed: {0}")]
    PasswordVerification(String),

    /// Hashing a new password failed
    #[error("password hashing failed")]
    HashingFailed,

    // ==================
    // Session Token Errors
    // ==================

    /// No session cookie on the request
    #[error("no cookie")]
    MissingCookie,

    /// Cookie present but the token is malformed or its signature is wrong
    #[error("corrupted session token")]
    Corrupted,

    /// Token decoded but its expiry has passed
    #[error("expired session token")]
    Expired,

    /// Token decoded but the claim set is unusable
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Signing the claim set failed (key misconfiguration)
    #[error("session token signing failed")]
    Signing,

    // ==================
    // Refresh Token Errors
    // ==================

    /// Presented refresh token is unknown, stale, or expired
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// Another writer replaced the refresh token between read and save
    #[error("refresh token changed concurrently")]
    RefreshTokenConflict,

    // ==================
    // Internal Errors
    // ==================

    /// Storage collaborator failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Server configuration is unusable
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            AuthError::IncorrectCredentials => 401,
            AuthError::MissingCookie => 401,
            AuthError::Corrupted => 401,
            AuthError::Expired => 401,
            AuthError::InvalidClaims(_) => 401,
            AuthError::InvalidRefreshToken => 401,

            // 500 Internal Server Error
            AuthError::PasswordVerification(_) => 500,
            AuthError::HashingFailed => 500,
            AuthError::Signing => 500,
            AuthError::RefreshTokenConflict => 500,
            AuthError::Persistence(_) => 500,
            AuthError::Configuration(_) => 500,
        }
    }

    /// Whether this error came from session token validation
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCookie
                | AuthError::Corrupted
                | AuthError::Expired
                | AuthError::InvalidClaims(_)
        )
    }

    /// Whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Message safe to hand to the client
    pub fn client_message(&self) -> &'static str {
        match self {
            AuthError::IncorrectCredentials => "incorrect credentials",
            e if e.is_token_rejection() => "unauthorized",
            AuthError::InvalidRefreshToken => "unauthorized",
            _ => "internal error",
        }
    }
}
