//! Session key entity model.
//!
//! A session key is a single-use, time-limited opaque key exchanged for
//! a session identifier during an interactive login flow.

use chrono::{DateTime, Utc};
use keygate_core::SessionId;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A session key row.
///
/// State moves one way: a fresh key is either consumed (`stale` flips to
/// true) or ages past `expires_at`. Either way it grants nothing
/// afterwards and is eventually deleted by the garbage collector.
#[derive(Debug, Clone, FromRow)]
pub struct SessionKeyRecord {
    /// The opaque key handed to the client.
    pub key: String,

    /// The session the key exchanges for.
    pub session_id: Uuid,

    /// Whether the key has already been consumed.
    pub stale: bool,

    /// When the key stops being exchangeable.
    pub expires_at: DateTime<Utc>,

    /// When the key was created.
    pub created_at: DateTime<Utc>,
}

impl SessionKeyRecord {
    /// Get the session ID as a typed `SessionId`.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        SessionId::from_uuid(self.session_id)
    }

    /// Check whether the key's lifetime has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Insert a new key row.
    pub async fn create<'e, E>(executor: E, new: &NewSessionKey) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO session_keys (key, session_id, stale, expires_at, created_at)
            VALUES ($1, $2, FALSE, $3, $4)
            RETURNING *
            ",
        )
        .bind(&new.key)
        .bind(new.session_id)
        .bind(new.expires_at)
        .bind(new.created_at)
        .fetch_one(executor)
        .await
    }

    /// Find a key row.
    pub async fn find_by_key<'e, E>(executor: E, key: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM session_keys WHERE key = $1")
            .bind(key)
            .fetch_optional(executor)
            .await
    }

    /// Flip the stale flag, conditioned on it still being false.
    ///
    /// This is the compare-and-set that makes consumption at-most-once:
    /// of any number of concurrent callers, exactly one sees `true` here
    /// and the rest see `false`.
    pub async fn mark_stale<'e, E>(executor: E, key: &str) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("UPDATE session_keys SET stale = TRUE WHERE key = $1 AND stale = FALSE")
                .bind(key)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete keys that are stale or whose lifetime has passed at `now`.
    /// Returns the number of rows removed.
    pub async fn cleanup_expired<'e, E>(
        executor: E,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM session_keys WHERE stale = TRUE OR expires_at < $1")
                .bind(now)
                .execute(executor)
                .await?;
        Ok(result.rows_affected())
    }
}

/// Builder for inserting new session key rows.
#[derive(Debug, Clone)]
pub struct NewSessionKey {
    key: String,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl NewSessionKey {
    /// Create a builder with required fields.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        session_id: SessionId,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            session_id: *session_id.as_uuid(),
            expires_at,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_record(expires_at: DateTime<Utc>, stale: bool) -> SessionKeyRecord {
        SessionKeyRecord {
            key: "key-1".to_string(),
            session_id: Uuid::new_v4(),
            stale,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_fresh_key_is_not_expired() {
        let now = Utc::now();
        let record = sample_record(now + Duration::hours(1), false);
        assert!(!record.is_expired(now));
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let now = Utc::now();
        let record = sample_record(now - Duration::seconds(1), false);
        assert!(record.is_expired(now));
    }

    #[test]
    fn test_exact_expiry_instant_is_still_valid() {
        let now = Utc::now();
        let record = sample_record(now, false);
        assert!(!record.is_expired(now));
    }

    #[test]
    fn test_typed_session_id_accessor() {
        let record = sample_record(Utc::now(), false);
        assert_eq!(*record.session_id().as_uuid(), record.session_id);
    }
}
