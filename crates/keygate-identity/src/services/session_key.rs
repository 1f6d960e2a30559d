//! Single-use session exchange keys.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Duration;
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::PgPool;
use tracing::{debug, info};

use keygate_core::{Clock, SessionId, SystemClock};
use keygate_db::models::{NewSessionKey, SessionKeyRecord};

use crate::error::IdentityError;
use crate::gc::Purger;

/// Number of random bytes behind a generated key string.
const KEY_BYTES: usize = 24;

/// An opaque key paired with the session it exchanges for.
#[derive(Debug, Clone)]
pub struct SessionKey {
    /// The key string handed to the client.
    pub key: String,

    /// The session the key exchanges for.
    pub session_id: SessionId,
}

impl SessionKey {
    /// Generate a key with fresh random key material.
    #[must_use]
    pub fn generate(session_id: SessionId) -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            key: URL_SAFE_NO_PAD.encode(bytes),
            session_id,
        }
    }
}

/// Issues and consumes single-use, time-limited session exchange keys.
///
/// A stored key moves one way: it is consumed exactly once by [`pop`],
/// or it expires. Either way it grants nothing afterwards; the garbage
/// collector eventually deletes the dead row.
///
/// [`pop`]: SessionKeyStore::pop
#[derive(Clone)]
pub struct SessionKeyStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl SessionKeyStore {
    /// Create a store reading time from the system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store a key, exchangeable until `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Database` on storage failure, including
    /// a duplicate key string.
    pub async fn push(&self, session_key: &SessionKey, ttl: Duration) -> Result<(), IdentityError> {
        let now = self.clock.now();
        let new = NewSessionKey::new(&session_key.key, session_key.session_id, now + ttl, now);
        SessionKeyRecord::create(&self.pool, &new).await?;
        Ok(())
    }

    /// Consume a key, returning its session ID.
    ///
    /// Consumption is at-most-once: of any number of concurrent callers
    /// racing on the same fresh key, exactly one wins; the rest fail
    /// with `InvalidKey`.
    ///
    /// # Errors
    ///
    /// - `IdentityError::NotFound` when no such key exists
    /// - `IdentityError::InvalidKey` when the key is stale, expired, or
    ///   was consumed concurrently
    /// - `IdentityError::Database` on storage failure
    pub async fn pop(&self, key: &str) -> Result<SessionId, IdentityError> {
        let record = SessionKeyRecord::find_by_key(&self.pool, key)
            .await?
            .ok_or_else(|| IdentityError::NotFound("session key".to_string()))?;
        if record.stale || record.is_expired(self.clock.now()) {
            return Err(IdentityError::InvalidKey);
        }
        // Zero rows here means another caller consumed the key between
        // our read and this update.
        if !SessionKeyRecord::mark_stale(&self.pool, key).await? {
            return Err(IdentityError::InvalidKey);
        }
        Ok(record.session_id())
    }

    /// Inspect a key without consuming it.
    ///
    /// # Errors
    ///
    /// As [`SessionKeyStore::pop`], minus the consumption race.
    pub async fn peek(&self, key: &str) -> Result<SessionId, IdentityError> {
        let record = SessionKeyRecord::find_by_key(&self.pool, key)
            .await?
            .ok_or_else(|| IdentityError::NotFound("session key".to_string()))?;
        if record.stale || record.is_expired(self.clock.now()) {
            return Err(IdentityError::InvalidKey);
        }
        Ok(record.session_id())
    }

    /// Delete stale and expired keys, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Database` on storage failure. Zero rows
    /// removed is not an error.
    pub async fn purge_dead_keys(&self) -> Result<u64, IdentityError> {
        let removed = SessionKeyRecord::cleanup_expired(&self.pool, self.clock.now()).await?;
        if removed > 0 {
            info!(count = removed, "Purged dead session keys");
        } else {
            debug!("No dead session keys to purge");
        }
        Ok(removed)
    }
}

#[async_trait]
impl Purger for SessionKeyStore {
    fn name(&self) -> &str {
        "session_keys"
    }

    async fn purge(&self) -> Result<u64, IdentityError> {
        self.purge_dead_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique() {
        let session_id = SessionId::new();
        let first = SessionKey::generate(session_id);
        let second = SessionKey::generate(session_id);

        assert_ne!(first.key, second.key);
        assert_eq!(first.session_id, session_id);
    }

    #[test]
    fn test_generated_key_is_url_safe() {
        let key = SessionKey::generate(SessionId::new()).key;

        assert!(!key.is_empty());
        assert!(URL_SAFE_NO_PAD.decode(&key).is_ok());
        assert!(!key.contains('='));
        assert!(!key.contains('+'));
        assert!(!key.contains('/'));
    }
}
