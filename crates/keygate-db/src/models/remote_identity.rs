//! Remote identity model.

use chrono::{DateTime, Utc};
use keygate_core::UserId;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// The pairing of an upstream connector with that provider's user
/// identifier, mapped to exactly one local user.
///
/// Local password accounts are represented the same way, under the local
/// connector with the user's own ID as the remote ID.
#[derive(Debug, Clone, FromRow)]
pub struct RemoteIdentity {
    /// Identifier of the connector the identity arrived through.
    pub connector_id: String,

    /// The upstream provider's identifier for the user.
    pub remote_id: String,

    /// The local user the identity maps to.
    pub user_id: Uuid,

    /// When the mapping was created.
    pub created_at: DateTime<Utc>,
}

impl RemoteIdentity {
    /// Get the user ID as a typed `UserId`.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }

    /// Insert a mapping row.
    pub async fn create<'e, E>(
        executor: E,
        connector_id: &str,
        remote_id: &str,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO remote_identities (connector_id, remote_id, user_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(connector_id)
        .bind(remote_id)
        .bind(user_id)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    /// Find the mapping for a connector and remote ID pair.
    pub async fn find<'e, E>(
        executor: E,
        connector_id: &str,
        remote_id: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            "SELECT * FROM remote_identities WHERE connector_id = $1 AND remote_id = $2",
        )
        .bind(connector_id)
        .bind(remote_id)
        .fetch_optional(executor)
        .await
    }
}
