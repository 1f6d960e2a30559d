//! Transactional user lifecycle orchestration.

use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use url::Url;

use keygate_auth::{EmailVerification, PasswordReset, PasswordService};
use keygate_core::{Clock, SystemClock, UserId};
use keygate_db::models::{NewUser, PasswordInfo, RemoteIdentity, User};

use crate::error::IdentityError;
use crate::services::validation;

/// Connector ID recorded for identities that authenticate with a local
/// password rather than an upstream provider.
pub const LOCAL_CONNECTOR_ID: &str = "local";

/// Orchestrates multi-record user mutations.
///
/// Every mutating operation runs inside one transaction: the first
/// error rolls everything back and propagates unchanged, and a failed
/// commit is surfaced as [`IdentityError::CommitFailed`] rather than
/// retried. No operation ever leaves a partial write behind.
#[derive(Clone)]
pub struct UserManager {
    pool: PgPool,
    hasher: PasswordService,
    clock: Arc<dyn Clock>,
}

impl UserManager {
    /// Create a manager with the default hasher and system clock.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hasher: PasswordService::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the password hasher, for tuning hash cost.
    #[must_use]
    pub fn with_hasher(mut self, hasher: PasswordService) -> Self {
        self.hasher = hasher;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and insert a user row inside the caller's transaction.
    ///
    /// Every creation path funnels through here, so the email format and
    /// uniqueness invariants hold no matter how the user arrives.
    async fn insert_new_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        email_verified: bool,
        display_name: Option<&str>,
    ) -> Result<User, IdentityError> {
        if !validation::valid_email(email) {
            return Err(IdentityError::InvalidEmail(email.to_string()));
        }
        if User::find_by_email(&mut **tx, email)
            .await
            .map_err(IdentityError::Database)?
            .is_some()
        {
            return Err(IdentityError::DuplicateEmail);
        }

        let mut new = NewUser::new(UserId::new(), email, self.clock.now())
            .email_verified(email_verified);
        if let Some(name) = display_name {
            new = new.display_name(name);
        }
        User::create(&mut **tx, &new)
            .await
            .map_err(IdentityError::Database)
    }

    /// Create a user with an already-hashed password.
    ///
    /// Writes the user, a remote identity under `connector_id` keyed by
    /// the new user's own ID, and the password row, all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidEmail` on a malformed address
    /// - `IdentityError::DuplicateEmail` when the address is taken
    /// - `IdentityError::Database` / `CommitFailed` on storage failure
    pub async fn create_user(
        &self,
        email: &str,
        email_verified: bool,
        display_name: Option<&str>,
        hashed_password: &str,
        connector_id: &str,
    ) -> Result<UserId, IdentityError> {
        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        let user = self
            .insert_new_user(&mut tx, email, email_verified, display_name)
            .await?;
        let user_id = user.user_id();

        RemoteIdentity::create(
            &mut *tx,
            connector_id,
            &user_id.to_string(),
            user.id,
            user.created_at,
        )
        .await
        .map_err(IdentityError::Database)?;
        PasswordInfo::create(&mut *tx, user.id, hashed_password, user.created_at)
            .await
            .map_err(IdentityError::Database)?;

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        info!(user_id = %user_id, "Created user");
        Ok(user_id)
    }

    /// Register a user arriving through an upstream identity provider.
    ///
    /// # Errors
    ///
    /// - `IdentityError::DuplicateRemoteIdentity` when the connector and
    ///   remote ID pair already maps to a user
    /// - as [`UserManager::create_user`] otherwise
    pub async fn register_with_remote_identity(
        &self,
        email: &str,
        email_verified: bool,
        connector_id: &str,
        remote_id: &str,
    ) -> Result<UserId, IdentityError> {
        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        if RemoteIdentity::find(&mut *tx, connector_id, remote_id)
            .await
            .map_err(IdentityError::Database)?
            .is_some()
        {
            return Err(IdentityError::DuplicateRemoteIdentity);
        }

        let user = self
            .insert_new_user(&mut tx, email, email_verified, None)
            .await?;
        RemoteIdentity::create(&mut *tx, connector_id, remote_id, user.id, user.created_at)
            .await
            .map_err(IdentityError::Database)?;

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        let user_id = user.user_id();
        info!(user_id = %user_id, connector_id, "Registered user with remote identity");
        Ok(user_id)
    }

    /// Register a user with an email address and plaintext password.
    ///
    /// The password is checked against the strength policy and hashed;
    /// the user's identity is recorded under `connector_id` keyed by the
    /// new user's own ID.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidPassword` when the password is too weak
    /// - as [`UserManager::create_user`] otherwise
    pub async fn register_with_password(
        &self,
        email: &str,
        plaintext: &str,
        connector_id: &str,
    ) -> Result<UserId, IdentityError> {
        if !validation::valid_password(plaintext) {
            return Err(IdentityError::InvalidPassword);
        }
        let password_hash = self.hasher.hash_password(plaintext)?;

        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        let user = self.insert_new_user(&mut tx, email, false, None).await?;
        let user_id = user.user_id();
        RemoteIdentity::create(
            &mut *tx,
            connector_id,
            &user_id.to_string(),
            user.id,
            user.created_at,
        )
        .await
        .map_err(IdentityError::Database)?;
        PasswordInfo::create(&mut *tx, user.id, &password_hash, user.created_at)
            .await
            .map_err(IdentityError::Database)?;

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        info!(user_id = %user_id, "Registered user with password");
        Ok(user_id)
    }

    /// Mark the address named by a verification token as verified,
    /// returning the token's callback for the caller to redirect to.
    ///
    /// # Errors
    ///
    /// - `IdentityError::NotFound` when the token's subject no longer exists
    /// - `IdentityError::EmailMismatch` when the stored address differs
    ///   from the token's email claim
    /// - `IdentityError::EmailAlreadyVerified` when the flag is already set
    /// - `IdentityError::Database` / `CommitFailed` on storage failure
    pub async fn verify_email(&self, token: &EmailVerification) -> Result<Url, IdentityError> {
        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        let user = User::find_by_id(&mut *tx, *token.user_id().as_uuid())
            .await
            .map_err(IdentityError::Database)?
            .ok_or_else(|| IdentityError::NotFound("user".to_string()))?;
        if user.email != token.email() {
            return Err(IdentityError::EmailMismatch);
        }
        if user.email_verified {
            return Err(IdentityError::EmailAlreadyVerified);
        }
        if !User::set_email_verified(&mut *tx, user.id)
            .await
            .map_err(IdentityError::Database)?
        {
            return Err(IdentityError::NotFound("user".to_string()));
        }

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        info!(user_id = %user.user_id(), "Verified email address");
        Ok(token.callback().clone())
    }

    /// Change a password authorized by a reset token.
    ///
    /// The token embeds the hash that was current when it was minted; if
    /// the stored hash has moved on since, the link is stale and the
    /// change is refused. Returns the token's callback when the reset
    /// was client-initiated.
    ///
    /// # Errors
    ///
    /// - `IdentityError::InvalidPassword` when the new password is too weak
    /// - `IdentityError::NotFound` when the user has no password record
    /// - `IdentityError::PasswordAlreadyChanged` when the stored hash no
    ///   longer matches the token
    /// - `IdentityError::Database` / `CommitFailed` on storage failure
    pub async fn change_password(
        &self,
        token: &PasswordReset,
        new_plaintext: &str,
    ) -> Result<Option<Url>, IdentityError> {
        if !validation::valid_password(new_plaintext) {
            return Err(IdentityError::InvalidPassword);
        }
        let password_hash = self.hasher.hash_password(new_plaintext)?;

        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        let info = PasswordInfo::find_by_user_id(&mut *tx, *token.user_id().as_uuid())
            .await
            .map_err(IdentityError::Database)?
            .ok_or_else(|| IdentityError::NotFound("password".to_string()))?;
        if info.password_hash != token.password() {
            return Err(IdentityError::PasswordAlreadyChanged);
        }
        if !PasswordInfo::update_hash(&mut *tx, info.user_id, &password_hash, self.clock.now())
            .await
            .map_err(IdentityError::Database)?
        {
            return Err(IdentityError::NotFound("password".to_string()));
        }

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        info!(user_id = %info.user_id(), "Changed password");
        Ok(token.callback().cloned())
    }

    /// Set or clear a user's disabled flag.
    ///
    /// # Errors
    ///
    /// - `IdentityError::NotFound` when the user does not exist
    /// - `IdentityError::Database` / `CommitFailed` on storage failure
    pub async fn set_disabled(
        &self,
        user_id: UserId,
        disabled: bool,
    ) -> Result<(), IdentityError> {
        let mut tx = self.pool.begin().await.map_err(IdentityError::Database)?;

        if !User::set_disabled(&mut *tx, *user_id.as_uuid(), disabled)
            .await
            .map_err(IdentityError::Database)?
        {
            return Err(IdentityError::NotFound("user".to_string()));
        }

        tx.commit().await.map_err(IdentityError::CommitFailed)?;

        info!(user_id = %user_id, disabled, "Updated disabled flag");
        Ok(())
    }
}
