//! Password and secret hashing using Argon2id.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2,
};

use crate::error::AuthError;

/// Service for hashing and verifying passwords and other bearer secrets.
///
/// Every hash carries its own random salt and the parameters it was
/// produced with, so parameter changes only affect new hashes.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordService").finish_non_exhaustive()
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordService {
    /// Create a service with the OWASP-recommended Argon2id parameters
    /// (19 MiB memory, 2 iterations, 1 lane).
    #[must_use]
    pub fn new() -> Self {
        // Params::new only fails on out-of-range values, and these are
        // the library's own recommended settings.
        let params = argon2::Params::new(19456, 2, 1, None).expect("valid Argon2 params");
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    /// Create a service with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingFailed` when the parameters are out of
    /// range for Argon2.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = argon2::Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::HashingFailed(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }

    /// Hash a password with a freshly generated salt.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingFailed` if hashing fails.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidHashFormat` when the stored hash cannot
    /// be parsed, and `AuthError::HashingFailed` on other failures. A
    /// well-formed hash that simply does not match yields `Ok(false)`.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| AuthError::InvalidHashFormat)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::HashingFailed(e.to_string())),
        }
    }
}
