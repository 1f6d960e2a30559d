//! Database entity models for keygate-db.
//!
//! These models represent the database tables and provide
//! type-safe interactions with PostgreSQL.

pub mod client;
pub mod password_info;
pub mod refresh_token;
pub mod remote_identity;
pub mod session_key;
pub mod user;

pub use client::{Client, NewClient};
pub use password_info::PasswordInfo;
pub use refresh_token::{NewRefreshToken, RefreshTokenRecord};
pub use remote_identity::RemoteIdentity;
pub use session_key::{NewSessionKey, SessionKeyRecord};
pub use user::{NewUser, User};
