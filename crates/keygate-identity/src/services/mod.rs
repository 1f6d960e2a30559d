//! Identity services.

pub mod refresh;
pub mod session_key;
pub mod user;
pub mod validation;

pub use refresh::{PayloadSource, RandomPayload, RefreshTokenStore};
pub use session_key::{SessionKey, SessionKeyStore};
pub use user::{UserManager, LOCAL_CONNECTOR_ID};
