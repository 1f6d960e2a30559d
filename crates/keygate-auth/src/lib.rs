//! Claim token codec and secret hashing for keygate.
//!
//! This crate provides:
//! - RS256 signing and verification for purpose-bound claim tokens
//! - Email verification, password reset, and invitation token types
//! - Argon2id hashing for passwords and refresh token payloads
//!
//! # Example
//!
//! ```rust,ignore
//! use keygate_auth::{EmailVerification, KeySet, SigningKey};
//! use keygate_core::{SystemClock, UserId};
//!
//! // Mint a verification token for a freshly registered user
//! let token = EmailVerification::new(
//!     UserId::new(),
//!     "user@example.com",
//!     "client-1",
//!     "https://idp.example.com",
//!     &callback,
//!     chrono::Duration::hours(24),
//!     &SystemClock,
//! );
//! let signed = token.sign(&signing_key)?;
//!
//! // Later, when the user follows the link
//! let parsed = EmailVerification::parse_and_verify(
//!     &signed,
//!     "https://idp.example.com",
//!     &keys,
//!     &SystemClock,
//! )?;
//! ```

mod claims;
mod error;
mod jwt;
mod password;
mod tokens;

// Re-export public API
pub use claims::ClaimSet;
pub use error::AuthError;
pub use jwt::{KeySet, SigningKey};
pub use password::PasswordService;
pub use tokens::{EmailVerification, Invitation, PasswordReset, EXPIRY_LEEWAY_SECS};
