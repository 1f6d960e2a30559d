//! # Identity Core
//!
//! User, credential, and session-key management for keygate.
//!
//! This crate provides the infrastructure for:
//! - User registration and lifecycle (email verification, password
//!   change, disable) backed by Postgres
//! - Opaque refresh tokens whose payloads are stored only as Argon2
//!   hashes
//! - Single-use session keys handed across the login redirect
//! - A supervised garbage collector that reclaims expired rows
//!
//! ## Example
//!
//! ```ignore
//! use keygate_identity::{GarbageCollector, SessionKeyStore, UserManager};
//!
//! let users = UserManager::new(pool.clone());
//! let user_id = users
//!     .register_with_password("ada@example.com", "hunter42", LOCAL_CONNECTOR_ID)
//!     .await?;
//!
//! let keys = SessionKeyStore::new(pool.clone());
//! let gc = Arc::new(
//!     GarbageCollector::new(Duration::from_secs(300)).with_purger(Arc::new(keys.clone())),
//! );
//! tokio::spawn(gc.run(cancel_rx));
//! ```

pub mod error;
pub mod gc;
pub mod services;

// Re-exports for convenience
pub use error::IdentityError;
pub use gc::{GarbageCollector, Purger};
pub use services::{
    PayloadSource, RandomPayload, RefreshTokenStore, SessionKey, SessionKeyStore, UserManager,
    LOCAL_CONNECTOR_ID,
};
