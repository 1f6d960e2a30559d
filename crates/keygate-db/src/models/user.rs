//! User entity model.

use chrono::{DateTime, Utc};
use keygate_core::UserId;
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A user account.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    /// Stable unique identifier.
    pub id: Uuid,

    /// The user's email address. Unique case-insensitively.
    pub email: String,

    /// Whether ownership of the email address has been proven.
    pub email_verified: bool,

    /// Optional human-readable name.
    pub display_name: Option<String>,

    /// Whether the user holds administrative privileges.
    pub admin: bool,

    /// Whether the account is blocked from signing in.
    pub disabled: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Get the user ID as a typed `UserId`.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.id)
    }

    /// Insert a new user row.
    pub async fn create<'e, E>(executor: E, new: &NewUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO users (id, email, email_verified, display_name, admin, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(new.id)
        .bind(&new.email)
        .bind(new.email_verified)
        .bind(&new.display_name)
        .bind(new.admin)
        .bind(new.created_at)
        .fetch_one(executor)
        .await
    }

    /// Find a user by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a user by email address, case-insensitively.
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(executor)
            .await
    }

    /// Mark a user's email address as verified.
    ///
    /// Returns `false` when no row matched.
    pub async fn set_email_verified<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the disabled flag.
    ///
    /// Returns `false` when no row matched.
    pub async fn set_disabled<'e, E>(
        executor: E,
        id: Uuid,
        disabled: bool,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET disabled = $2 WHERE id = $1")
            .bind(id)
            .bind(disabled)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Builder for inserting new user rows.
#[derive(Debug, Clone)]
pub struct NewUser {
    id: Uuid,
    email: String,
    email_verified: bool,
    display_name: Option<String>,
    admin: bool,
    created_at: DateTime<Utc>,
}

impl NewUser {
    /// Create a builder with required fields.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: *id.as_uuid(),
            email: email.into(),
            email_verified: false,
            display_name: None,
            admin: false,
            created_at,
        }
    }

    /// Mark the email address as already verified, as for users arriving
    /// through an upstream provider that vouches for the address.
    #[must_use]
    pub fn email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Grant administrative privileges.
    #[must_use]
    pub fn admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }
}
