//! Error types for the identity services.

use keygate_auth::AuthError;
use thiserror::Error;

/// Errors returned by the identity services.
///
/// Validation, conflict, not-found, and state errors are expected and
/// stable; callers can map them directly to client-facing responses.
/// `CommitFailed` and `Database` indicate operational trouble and should
/// be logged with context and mapped to a generic failure.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The email address does not parse as a plain mailbox.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// The password does not meet the minimum strength policy.
    #[error("password does not meet the minimum strength policy")]
    InvalidPassword,

    /// A user ID required by the operation is missing or does not match.
    #[error("invalid user ID")]
    InvalidUserId,

    /// A client ID required by the operation is empty or does not match.
    #[error("invalid client ID")]
    InvalidClientId,

    /// The refresh token is malformed, unknown, revoked, or does not
    /// match its stored record.
    #[error("invalid refresh token")]
    InvalidToken,

    /// The session key is stale, expired, or was consumed concurrently.
    #[error("invalid session key")]
    InvalidKey,

    /// Another user already owns this email address.
    #[error("email address is already in use")]
    DuplicateEmail,

    /// The remote identity is already mapped to a user.
    #[error("remote identity is already mapped to a user")]
    DuplicateRemoteIdentity,

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The email address was verified previously.
    #[error("email address is already verified")]
    EmailAlreadyVerified,

    /// The token's email claim does not match the stored address.
    #[error("email address does not match the token")]
    EmailMismatch,

    /// The stored password changed after the reset token was issued.
    #[error("password was changed after the reset token was issued")]
    PasswordAlreadyChanged,

    /// A transaction commit failed. Nothing was written.
    #[error("transaction commit failed: {0}")]
    CommitFailed(#[source] sqlx::Error),

    /// A database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Token signing, verification, or hashing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IdentityError {
    /// Check if this error indicates a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, IdentityError::NotFound(_))
    }

    /// Check if this error indicates a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            IdentityError::DuplicateEmail | IdentityError::DuplicateRemoteIdentity
        )
    }

    /// Check if this error is a rejection of caller-supplied input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IdentityError::InvalidEmail(_)
                | IdentityError::InvalidPassword
                | IdentityError::InvalidUserId
                | IdentityError::InvalidClientId
        )
    }
}
