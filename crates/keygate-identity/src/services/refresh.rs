//! Opaque refresh token issuance, verification, and revocation.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::PgPool;
use tracing::info;

use keygate_auth::PasswordService;
use keygate_core::{Clock, SystemClock, UserId};
use keygate_db::models::{Client, NewRefreshToken, RefreshTokenRecord};

use crate::error::IdentityError;

/// Separator between the record ID and payload halves of a token string.
/// A character that appears in neither a decimal integer nor base64url
/// output, so a well-formed token splits unambiguously.
const TOKEN_DELIMITER: char = '/';

/// Number of random bytes in a token payload.
const PAYLOAD_BYTES: usize = 32;

/// Source of random token payloads.
pub trait PayloadSource: Send + Sync {
    /// Produce one payload's worth of random bytes.
    fn payload(&self) -> Vec<u8>;
}

/// Default payload source backed by the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPayload;

impl PayloadSource for RandomPayload {
    fn payload(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; PAYLOAD_BYTES];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

fn build_token(id: i64, payload: &str) -> String {
    format!("{id}{TOKEN_DELIMITER}{payload}")
}

fn parse_token(token: &str) -> Result<(i64, &str), IdentityError> {
    let (id_part, payload) = token
        .split_once(TOKEN_DELIMITER)
        .ok_or(IdentityError::InvalidToken)?;
    if payload.is_empty() || payload.contains(TOKEN_DELIMITER) {
        return Err(IdentityError::InvalidToken);
    }
    let id = id_part
        .parse::<i64>()
        .map_err(|_| IdentityError::InvalidToken)?;
    if URL_SAFE_NO_PAD.decode(payload).is_err() {
        return Err(IdentityError::InvalidToken);
    }
    Ok((id, payload))
}

/// Issues, verifies, and revokes long-lived opaque refresh tokens.
///
/// A token string pairs a record's auto-incremented ID with a random
/// payload; only the Argon2 hash of the payload is persisted. The ID
/// need not be unguessable: security rests on payload entropy plus the
/// slow hash.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: PgPool,
    hasher: PasswordService,
    payloads: Arc<dyn PayloadSource>,
    clock: Arc<dyn Clock>,
}

impl RefreshTokenStore {
    /// Create a store with the default hasher, payload source, and
    /// system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hasher: PasswordService::new(),
            payloads: Arc::new(RandomPayload),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the payload hasher, for tuning hash cost.
    #[must_use]
    pub fn with_hasher(mut self, hasher: PasswordService) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replace the payload source.
    #[must_use]
    pub fn with_payload_source(mut self, payloads: Arc<dyn PayloadSource>) -> Self {
        self.payloads = payloads;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a refresh token for a user and client, returning the token
    /// string to hand to the client. The payload inside it is never
    /// stored; a record carrying its hash is.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidUserId` / `InvalidClientId` on empty inputs
    /// - `IdentityError::Auth` if hashing fails
    /// - `IdentityError::Database` on storage failure
    pub async fn create(
        &self,
        user_id: UserId,
        client_id: &str,
        scopes: &[String],
    ) -> Result<String, IdentityError> {
        if user_id.as_uuid().is_nil() {
            return Err(IdentityError::InvalidUserId);
        }
        if client_id.is_empty() {
            return Err(IdentityError::InvalidClientId);
        }

        let payload = URL_SAFE_NO_PAD.encode(self.payloads.payload());
        let payload_hash = self.hasher.hash_password(&payload)?;

        let new = NewRefreshToken::new(user_id, client_id, payload_hash, self.clock.now())
            .scopes(scopes);
        let record = RefreshTokenRecord::create(&self.pool, &new).await?;

        Ok(build_token(record.id, &payload))
    }

    /// Verify a token string presented by a client, returning the owning
    /// user and the granted scopes.
    ///
    /// A token that is malformed, unknown, or fails the payload hash
    /// check is reported uniformly as `InvalidToken`, so a caller cannot
    /// learn which part was wrong.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidToken` as above
    /// - `IdentityError::InvalidClientId` when the record belongs to a
    ///   different client
    /// - `IdentityError::Database` on storage failure
    pub async fn verify(
        &self,
        client_id: &str,
        token: &str,
    ) -> Result<(UserId, Vec<String>), IdentityError> {
        let (id, payload) = parse_token(token)?;

        let record = RefreshTokenRecord::find_by_id(&self.pool, id)
            .await?
            .ok_or(IdentityError::InvalidToken)?;
        if record.client_id != client_id {
            return Err(IdentityError::InvalidClientId);
        }
        if !self.hasher.verify_password(payload, &record.payload_hash)? {
            return Err(IdentityError::InvalidToken);
        }

        Ok((record.user_id(), record.scope_list()))
    }

    /// Revoke a token, deleting its record.
    ///
    /// The delete runs in a transaction. Zero rows deleted means a
    /// concurrent revoke won the race; that surfaces as `InvalidToken`
    /// and the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// As [`RefreshTokenStore::verify`], plus `InvalidUserId` when the
    /// record belongs to a different user and `CommitFailed` when the
    /// commit itself fails.
    pub async fn revoke(&self, user_id: UserId, token: &str) -> Result<(), IdentityError> {
        let (id, payload) = parse_token(token)?;

        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        let record = RefreshTokenRecord::find_by_id(&mut *tx, id)
            .await
            .map_err(IdentityError::Database)?
            .ok_or(IdentityError::InvalidToken)?;
        if record.user_id() != user_id {
            return Err(IdentityError::InvalidUserId);
        }
        if !self.hasher.verify_password(payload, &record.payload_hash)? {
            return Err(IdentityError::InvalidToken);
        }
        if !RefreshTokenRecord::delete(&mut *tx, id)
            .await
            .map_err(IdentityError::Database)?
        {
            return Err(IdentityError::InvalidToken);
        }

        tx.commit().await.map_err(IdentityError::CommitFailed)?;
        Ok(())
    }

    /// Revoke every token a user holds for one client. Revoking zero
    /// tokens is not an error.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Database` on storage failure.
    pub async fn revoke_tokens_for_client(
        &self,
        user_id: UserId,
        client_id: &str,
    ) -> Result<(), IdentityError> {
        let removed =
            RefreshTokenRecord::delete_for_client(&self.pool, *user_id.as_uuid(), client_id)
                .await?;
        if removed > 0 {
            info!(count = removed, client_id, "Revoked refresh tokens");
        }
        Ok(())
    }

    /// List the clients a user holds at least one refresh token for,
    /// with each client's secret redacted.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Database` on storage failure.
    pub async fn clients_with_refresh_tokens(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Client>, IdentityError> {
        let mut clients =
            Client::with_refresh_tokens_for_user(&self.pool, *user_id.as_uuid()).await?;
        for client in &mut clients {
            client.secret.clear();
        }
        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        for (id, payload) in [(1, "YQ"), (42, "c29tZS1wYXlsb2Fk"), (i64::MAX, "AAAA")] {
            let token = build_token(id, payload);
            assert_eq!(parse_token(&token).unwrap(), (id, payload));
        }
    }

    #[test]
    fn test_parse_rejects_missing_delimiter() {
        assert!(matches!(
            parse_token("42").unwrap_err(),
            IdentityError::InvalidToken
        ));
    }

    #[test]
    fn test_parse_rejects_extra_delimiter() {
        assert!(matches!(
            parse_token("42/YQ/YQ").unwrap_err(),
            IdentityError::InvalidToken
        ));
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(parse_token("/YQ").is_err());
        assert!(parse_token("42/").is_err());
        assert!(parse_token("/").is_err());
    }

    #[test]
    fn test_parse_rejects_non_integer_id() {
        assert!(parse_token("forty-two/YQ").is_err());
        assert!(parse_token("4.2/YQ").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_base64url() {
        assert!(parse_token("42/not base64!").is_err());
        assert!(parse_token("42/YQ==").is_err());
    }

    #[test]
    fn test_random_payloads_are_unique() {
        let source = RandomPayload;
        let first = source.payload();
        let second = source.payload();

        assert_eq!(first.len(), PAYLOAD_BYTES);
        assert_ne!(first, second);
    }
}
