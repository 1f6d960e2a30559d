//! Refresh token entity model.
//!
//! Represents a long-lived opaque refresh token stored for revocation
//! support.

use chrono::{DateTime, Utc};
use keygate_core::UserId;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A refresh token record.
///
/// Only the hash of the token's random payload is stored; the token
/// string held by the client pairs this row's ID with the payload.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    /// Auto-incremented identifier, the public half of the token string.
    pub id: i64,

    /// Argon2 hash of the random payload.
    pub payload_hash: String,

    /// The user who owns this token.
    pub user_id: Uuid,

    /// The client the token was issued to.
    pub client_id: String,

    /// Granted scopes, joined by single spaces.
    pub scopes: String,

    /// When the token was created.
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Get the user ID as a typed `UserId`.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }

    /// The granted scopes as a list.
    #[must_use]
    pub fn scope_list(&self) -> Vec<String> {
        self.scopes.split_whitespace().map(String::from).collect()
    }

    /// Insert a new token row, returning it with its assigned ID.
    pub async fn create<'e, E>(executor: E, new: &NewRefreshToken) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO refresh_tokens (payload_hash, user_id, client_id, scopes, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            ",
        )
        .bind(&new.payload_hash)
        .bind(new.user_id)
        .bind(&new.client_id)
        .bind(&new.scopes)
        .bind(new.created_at)
        .fetch_one(executor)
        .await
    }

    /// Find a token by its record ID.
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Delete a token by ID.
    ///
    /// Returns `false` when no row matched, which a revocation treats as
    /// a lost race with a concurrent revoke.
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every token a user holds for one client. Zero rows is not
    /// an error.
    pub async fn delete_for_client<'e, E>(
        executor: E,
        user_id: Uuid,
        client_id: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND client_id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Builder for inserting new refresh token rows.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    payload_hash: String,
    user_id: Uuid,
    client_id: String,
    scopes: String,
    created_at: DateTime<Utc>,
}

impl NewRefreshToken {
    /// Create a builder with required fields.
    #[must_use]
    pub fn new(
        user_id: UserId,
        client_id: impl Into<String>,
        payload_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payload_hash: payload_hash.into(),
            user_id: *user_id.as_uuid(),
            client_id: client_id.into(),
            scopes: String::new(),
            created_at,
        }
    }

    /// Set the granted scopes, stored joined by single spaces.
    #[must_use]
    pub fn scopes(mut self, scopes: &[String]) -> Self {
        self.scopes = scopes.join(" ");
        self
    }
}
