//! Database layer for keygate.
//!
//! This crate provides:
//! - A Postgres connection pool wrapper
//! - Versioned schema migrations embedded at compile time
//! - Typed entity models with parameterized queries
//!
//! Models accept any `sqlx` Postgres executor, so the same query code
//! runs against the pool directly or inside a transaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use keygate_db::{models::User, run_migrations, DbPool};
//!
//! let pool = DbPool::connect("postgres://localhost/keygate").await?;
//! run_migrations(&pool).await?;
//!
//! let user = User::find_by_email(pool.inner(), "user@example.com").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
