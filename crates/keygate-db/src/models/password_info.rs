//! Password credential model.

use chrono::{DateTime, Utc};
use keygate_core::UserId;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A user's stored password credential.
///
/// Only the Argon2 hash is stored, never the plaintext.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordInfo {
    /// The user this credential belongs to. One row per user.
    pub user_id: Uuid,

    /// PHC-formatted Argon2 hash of the password.
    pub password_hash: String,

    /// Optional forced-rotation deadline.
    pub password_expires: Option<DateTime<Utc>>,

    /// When the hash was last written.
    pub updated_at: DateTime<Utc>,
}

impl PasswordInfo {
    /// Get the user ID as a typed `UserId`.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }

    /// Insert a credential row for a user.
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO password_infos (user_id, password_hash, updated_at)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(updated_at)
        .fetch_one(executor)
        .await
    }

    /// Find the credential for a user.
    pub async fn find_by_user_id<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM password_infos WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Replace the stored hash.
    ///
    /// Returns `false` when the user has no credential row.
    pub async fn update_hash<'e, E>(
        executor: E,
        user_id: Uuid,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE password_infos SET password_hash = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(updated_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
