//! Integration tests for keygate-identity.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p keygate-identity --features integration`
//!
//! Prerequisites:
//! 1. Start a PostgreSQL server for the test database
//! 2. Set `DATABASE_URL` (optional, defaults to the local test database)

#![cfg(feature = "integration")]

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{fast_hasher, unique_email, unique_test_prefix, TestContext};
use url::Url;

use keygate_auth::{EmailVerification, PasswordReset};
use keygate_core::{FixedClock, SessionId, SystemClock, UserId};
use keygate_identity::services::{RefreshTokenStore, SessionKey, SessionKeyStore, UserManager};
use keygate_identity::{IdentityError, LOCAL_CONNECTOR_ID};

const ISSUER: &str = "https://keygate.test";

#[tokio::test]
async fn test_database_connection() {
    let ctx = TestContext::new().await;

    // Verify we can execute a simple query
    let row: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(ctx.pool.inner())
        .await
        .expect("Failed to execute query");

    assert_eq!(row.0, 1);
}

// ===========================================================================
// Refresh Tokens
// ===========================================================================

mod refresh_tokens {
    use super::*;

    fn store(ctx: &TestContext) -> RefreshTokenStore {
        RefreshTokenStore::new(ctx.pool.inner().clone()).with_hasher(fast_hasher())
    }

    #[tokio::test]
    async fn test_create_and_verify_round_trip() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-round-trip");
        let user_id = ctx.create_unique_user(&prefix).await;
        let client_id = ctx.create_unique_client(&prefix).await;
        let store = store(&ctx);

        let scopes = vec!["openid".to_string(), "profile".to_string()];
        let token = store
            .create(user_id, &client_id, &scopes)
            .await
            .expect("Failed to create refresh token");

        let (verified_user, verified_scopes) = store
            .verify(&client_id, &token)
            .await
            .expect("Failed to verify refresh token");

        assert_eq!(verified_user, user_id);
        assert_eq!(verified_scopes, scopes);
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_client() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-wrong-client");
        let user_id = ctx.create_unique_user(&prefix).await;
        let client_id = ctx.create_unique_client(&prefix).await;
        let other_client = ctx.create_unique_client(&prefix).await;
        let store = store(&ctx);

        let token = store
            .create(user_id, &client_id, &[])
            .await
            .expect("Failed to create refresh token");

        let result = store.verify(&other_client, &token).await;
        assert!(matches!(result, Err(IdentityError::InvalidClientId)));
    }

    #[tokio::test]
    async fn test_verify_rejects_unknown_and_malformed_tokens() {
        let ctx = TestContext::new().await;
        let store = store(&ctx);

        // Well formed but pointing at no record.
        let result = store.verify("any-client", "999999999/AAAA").await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));

        // Not even parseable.
        let result = store.verify("any-client", "no-delimiter-here").await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_revoke_deletes_the_token() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-revoke");
        let user_id = ctx.create_unique_user(&prefix).await;
        let client_id = ctx.create_unique_client(&prefix).await;
        let store = store(&ctx);

        let token = store
            .create(user_id, &client_id, &[])
            .await
            .expect("Failed to create refresh token");

        store
            .revoke(user_id, &token)
            .await
            .expect("Failed to revoke refresh token");

        let result = store.verify(&client_id, &token).await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));

        // The record is gone, so a second revoke cannot find it.
        let result = store.revoke(user_id, &token).await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_revoke_rejects_foreign_user() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-foreign");
        let user_id = ctx.create_unique_user(&prefix).await;
        let other_user = ctx.create_unique_user(&prefix).await;
        let client_id = ctx.create_unique_client(&prefix).await;
        let store = store(&ctx);

        let token = store
            .create(user_id, &client_id, &[])
            .await
            .expect("Failed to create refresh token");

        let result = store.revoke(other_user, &token).await;
        assert!(matches!(result, Err(IdentityError::InvalidUserId)));

        // The owner can still use it.
        store
            .verify(&client_id, &token)
            .await
            .expect("Token should survive a failed revoke");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_identities() {
        let ctx = TestContext::new().await;
        let store = store(&ctx);

        let result = store
            .create(UserId::from_uuid(uuid::Uuid::nil()), "client", &[])
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidUserId)));

        let result = store.create(UserId::new(), "", &[]).await;
        assert!(matches!(result, Err(IdentityError::InvalidClientId)));
    }

    #[tokio::test]
    async fn test_clients_with_refresh_tokens_redacts_secrets() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-clients");
        let user_id = ctx.create_unique_user(&prefix).await;
        let client_a = ctx.create_unique_client(&prefix).await;
        let client_b = ctx.create_unique_client(&prefix).await;
        ctx.create_unique_client(&prefix).await; // no token for this one
        let store = store(&ctx);

        // Two tokens against client A, one against client B.
        store.create(user_id, &client_a, &[]).await.expect("create");
        store.create(user_id, &client_a, &[]).await.expect("create");
        store.create(user_id, &client_b, &[]).await.expect("create");

        let clients = store
            .clients_with_refresh_tokens(user_id)
            .await
            .expect("Failed to list clients");

        let mut ids: Vec<&str> = clients.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        let mut expected = vec![client_a.as_str(), client_b.as_str()];
        expected.sort_unstable();
        assert_eq!(ids, expected);
        assert!(clients.iter().all(|c| c.secret.is_empty()));
    }

    #[tokio::test]
    async fn test_revoke_tokens_for_client_removes_all() {
        let ctx = TestContext::new().await;
        let prefix = unique_test_prefix("rt-revoke-all");
        let user_id = ctx.create_unique_user(&prefix).await;
        let client_id = ctx.create_unique_client(&prefix).await;
        let store = store(&ctx);

        let first = store.create(user_id, &client_id, &[]).await.expect("create");
        let second = store.create(user_id, &client_id, &[]).await.expect("create");

        store
            .revoke_tokens_for_client(user_id, &client_id)
            .await
            .expect("Failed to revoke tokens for client");

        for token in [&first, &second] {
            let result = store.verify(&client_id, token).await;
            assert!(matches!(result, Err(IdentityError::InvalidToken)));
        }
    }
}

// ===========================================================================
// Session Keys
// ===========================================================================

mod session_keys {
    use super::*;

    #[tokio::test]
    async fn test_push_peek_pop_round_trip() {
        let ctx = TestContext::new().await;
        let store = SessionKeyStore::new(ctx.pool.inner().clone());
        let session_id = SessionId::new();
        let key = SessionKey::generate(session_id);

        store
            .push(&key, Duration::minutes(10))
            .await
            .expect("Failed to push session key");

        // Peeking does not consume.
        assert_eq!(store.peek(&key.key).await.expect("peek"), session_id);
        assert_eq!(store.peek(&key.key).await.expect("peek"), session_id);

        assert_eq!(store.pop(&key.key).await.expect("pop"), session_id);

        // Consumed keys are dead for both peek and pop.
        assert!(matches!(
            store.peek(&key.key).await,
            Err(IdentityError::InvalidKey)
        ));
        assert!(matches!(
            store.pop(&key.key).await,
            Err(IdentityError::InvalidKey)
        ));
    }

    #[tokio::test]
    async fn test_pop_unknown_key_is_not_found() {
        let ctx = TestContext::new().await;
        let store = SessionKeyStore::new(ctx.pool.inner().clone());

        let result = store.pop("no-such-key").await;
        assert!(matches!(result, Err(IdentityError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_pops_have_a_single_winner() {
        let ctx = TestContext::new().await;
        let store = SessionKeyStore::new(ctx.pool.inner().clone());
        let session_id = SessionId::new();
        let key = SessionKey::generate(session_id);

        store
            .push(&key, Duration::minutes(10))
            .await
            .expect("Failed to push session key");

        let (first, second) = tokio::join!(store.pop(&key.key), store.pop(&key.key));

        let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one concurrent pop may succeed");
        for result in [first, second] {
            if let Ok(popped) = result {
                assert_eq!(popped, session_id);
            }
        }
    }

    #[tokio::test]
    async fn test_expired_key_is_rejected_then_purged() {
        let ctx = TestContext::new().await;
        let past_clock = FixedClock::at(Utc::now() - Duration::hours(1));
        let past_store =
            SessionKeyStore::new(ctx.pool.inner().clone()).with_clock(Arc::new(past_clock));
        let store = SessionKeyStore::new(ctx.pool.inner().clone());

        let key = SessionKey::generate(SessionId::new());
        past_store
            .push(&key, Duration::minutes(5))
            .await
            .expect("Failed to push session key");

        // Expired but still present: rejected as invalid, not missing.
        assert!(matches!(
            store.pop(&key.key).await,
            Err(IdentityError::InvalidKey)
        ));

        store.purge_dead_keys().await.expect("Failed to purge");

        assert!(matches!(
            store.pop(&key.key).await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_consumed_keys() {
        let ctx = TestContext::new().await;
        let store = SessionKeyStore::new(ctx.pool.inner().clone());
        let key = SessionKey::generate(SessionId::new());

        store
            .push(&key, Duration::minutes(10))
            .await
            .expect("Failed to push session key");
        store.pop(&key.key).await.expect("Failed to pop");

        store.purge_dead_keys().await.expect("Failed to purge");

        let result = store.pop(&key.key).await;
        assert!(matches!(result, Err(IdentityError::NotFound(_))));
    }
}

// ===========================================================================
// User Lifecycle
// ===========================================================================

mod user_lifecycle {
    use super::*;

    fn manager(ctx: &TestContext) -> UserManager {
        UserManager::new(ctx.pool.inner().clone()).with_hasher(fast_hasher())
    }

    async fn stored_password_hash(ctx: &TestContext, user_id: UserId) -> String {
        let row: (String,) =
            sqlx::query_as("SELECT password_hash FROM password_infos WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_one(ctx.pool.inner())
                .await
                .expect("Failed to load password hash");
        row.0
    }

    #[tokio::test]
    async fn test_register_with_password_creates_full_record() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let email = unique_email("register");

        let user_id = users
            .register_with_password(&email, "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");

        let row: (String, bool, bool) =
            sqlx::query_as("SELECT email, email_verified, disabled FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_one(ctx.pool.inner())
                .await
                .expect("Failed to load user");
        assert_eq!(row.0, email);
        assert!(!row.1, "a self-registered address starts unverified");
        assert!(!row.2);

        let hash = stored_password_hash(&ctx, user_id).await;
        assert!(fast_hasher()
            .verify_password("hunter42", &hash)
            .expect("Failed to check password"));

        let identities = ctx
            .count(
                "SELECT COUNT(*) FROM remote_identities WHERE user_id = $1",
                user_id.as_uuid(),
            )
            .await;
        assert_eq!(identities, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password_and_bad_email() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);

        let result = users
            .register_with_password(&unique_email("weak"), "tiny5", LOCAL_CONNECTOR_ID)
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidPassword)));

        let result = users
            .register_with_password("not-an-email", "hunter42", LOCAL_CONNECTOR_ID)
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_no_partial_rows() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let email = unique_email("duplicate");

        let user_id = users
            .register_with_password(&email, "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");

        // Same address again, case-folded, must be rejected.
        let result = users
            .register_with_password(&email.to_uppercase(), "hunter42", LOCAL_CONNECTOR_ID)
            .await;
        assert!(matches!(result, Err(IdentityError::DuplicateEmail)));

        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(&email)
                .fetch_one(ctx.pool.inner())
                .await
                .expect("Failed to count users");
        assert_eq!(row.0, 1);

        let infos = ctx
            .count(
                "SELECT COUNT(*) FROM password_infos WHERE user_id = $1",
                user_id.as_uuid(),
            )
            .await;
        assert_eq!(infos, 1);
    }

    #[tokio::test]
    async fn test_register_with_remote_identity_rejects_replays() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let remote_id = unique_test_prefix("gh-user");

        users
            .register_with_remote_identity(&unique_email("sso"), true, "github", &remote_id)
            .await
            .expect("Failed to register remote user");

        // The same upstream subject cannot mint a second account.
        let result = users
            .register_with_remote_identity(&unique_email("sso"), true, "github", &remote_id)
            .await;
        assert!(matches!(result, Err(IdentityError::DuplicateRemoteIdentity)));
    }

    #[tokio::test]
    async fn test_verify_email_flow() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let email = unique_email("verify");
        let callback = Url::parse("https://app.test/verified").expect("valid url");

        let user_id = users
            .register_with_password(&email, "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");

        let token = EmailVerification::new(
            user_id,
            &email,
            "app-1",
            ISSUER,
            &callback,
            Duration::minutes(30),
            &SystemClock,
        );

        let redirect = users
            .verify_email(&token)
            .await
            .expect("Failed to verify email");
        assert_eq!(redirect, callback);

        let row: (bool,) = sqlx::query_as("SELECT email_verified FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(ctx.pool.inner())
            .await
            .expect("Failed to load user");
        assert!(row.0);

        // Replaying the token must fail.
        let result = users.verify_email(&token).await;
        assert!(matches!(result, Err(IdentityError::EmailAlreadyVerified)));
    }

    #[tokio::test]
    async fn test_verify_email_rejects_changed_address() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let callback = Url::parse("https://app.test/verified").expect("valid url");

        let user_id = users
            .register_with_password(&unique_email("mismatch"), "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");

        let token = EmailVerification::new(
            user_id,
            &unique_email("other"),
            "app-1",
            ISSUER,
            &callback,
            Duration::minutes(30),
            &SystemClock,
        );

        let result = users.verify_email(&token).await;
        assert!(matches!(result, Err(IdentityError::EmailMismatch)));
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);

        let user_id = users
            .register_with_password(&unique_email("reset"), "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");
        let old_hash = stored_password_hash(&ctx, user_id).await;

        let token = PasswordReset::new(
            user_id,
            &old_hash,
            ISSUER,
            None,
            Duration::minutes(30),
            &SystemClock,
        );

        let redirect = users
            .change_password(&token, "new-secret-9")
            .await
            .expect("Failed to change password");
        assert!(redirect.is_none(), "no client, no callback to return");

        let new_hash = stored_password_hash(&ctx, user_id).await;
        assert!(fast_hasher()
            .verify_password("new-secret-9", &new_hash)
            .expect("Failed to check password"));

        // The token bound the old hash, so it is spent now.
        let result = users.change_password(&token, "another-10").await;
        assert!(matches!(result, Err(IdentityError::PasswordAlreadyChanged)));
    }

    #[tokio::test]
    async fn test_change_password_returns_client_callback() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);
        let callback = Url::parse("https://app.test/reset-done").expect("valid url");

        let user_id = users
            .register_with_password(&unique_email("reset-cb"), "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");
        let old_hash = stored_password_hash(&ctx, user_id).await;

        let token = PasswordReset::new(
            user_id,
            &old_hash,
            ISSUER,
            Some(("app-1", &callback)),
            Duration::minutes(30),
            &SystemClock,
        );

        let redirect = users
            .change_password(&token, "new-secret-9")
            .await
            .expect("Failed to change password");
        assert_eq!(redirect, Some(callback));
    }

    #[tokio::test]
    async fn test_set_disabled_round_trip() {
        let ctx = TestContext::new().await;
        let users = manager(&ctx);

        let user_id = users
            .register_with_password(&unique_email("disable"), "hunter42", LOCAL_CONNECTOR_ID)
            .await
            .expect("Failed to register user");

        users
            .set_disabled(user_id, true)
            .await
            .expect("Failed to disable user");

        let row: (bool,) = sqlx::query_as("SELECT disabled FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(ctx.pool.inner())
            .await
            .expect("Failed to load user");
        assert!(row.0);

        users
            .set_disabled(user_id, false)
            .await
            .expect("Failed to re-enable user");

        let result = users.set_disabled(UserId::new(), true).await;
        assert!(matches!(result, Err(IdentityError::NotFound(_))));
    }
}
