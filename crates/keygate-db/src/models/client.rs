//! OAuth client entity model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A registered OAuth client.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    /// Client identifier, chosen at registration.
    pub id: String,

    /// Client secret. Callers listing clients on behalf of a user must
    /// redact this field before returning it.
    pub secret: String,

    /// Human-readable client name.
    pub name: String,

    /// Allowed redirect URIs.
    pub redirect_uris: Vec<String>,

    /// When the client was registered.
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Insert a new client registration.
    pub async fn create<'e, E>(executor: E, new: &NewClient) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO clients (id, secret, name, redirect_uris)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(&new.id)
        .bind(&new.secret)
        .bind(&new.name)
        .bind(&new.redirect_uris)
        .fetch_one(executor)
        .await
    }

    /// Find a client by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List the clients a user holds at least one refresh token for.
    pub async fn with_refresh_tokens_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT DISTINCT c.*
            FROM clients c
            INNER JOIN refresh_tokens r ON r.client_id = c.id
            WHERE r.user_id = $1
            ORDER BY c.id
            ",
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}

/// Builder for inserting new client registrations.
#[derive(Debug, Clone)]
pub struct NewClient {
    id: String,
    secret: String,
    name: String,
    redirect_uris: Vec<String>,
}

impl NewClient {
    /// Create a builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            name: String::new(),
            redirect_uris: Vec::new(),
        }
    }

    /// Set the human-readable name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the allowed redirect URIs.
    #[must_use]
    pub fn redirect_uris(mut self, uris: Vec<String>) -> Self {
        self.redirect_uris = uris;
        self
    }
}
