//! Error types for token construction, verification, and password hashing.

use thiserror::Error;

/// Errors produced by the claim token codec and the password hasher.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// Token signature verification failed.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is malformed or failed validation.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token uses an unsupported signing algorithm.
    #[error("Invalid or unsupported algorithm")]
    InvalidAlgorithm,

    /// A required claim is absent or empty.
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// An embedded callback value does not parse as a URL.
    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Stored password hash is not in a recognized format.
    #[error("Invalid password hash format")]
    InvalidHashFormat,

    /// Signing or verification key is invalid.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl AuthError {
    /// Returns true if the error indicates an expired token.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Returns true if the error relates to token parsing or verification
    /// (as opposed to hashing or key loading).
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired
                | Self::InvalidSignature
                | Self::InvalidToken(_)
                | Self::InvalidAlgorithm
                | Self::MissingClaim(_)
                | Self::InvalidCallback(_)
        )
    }
}
