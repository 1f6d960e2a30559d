//! keygate Core Library
//!
//! Shared types for the keygate credential/token core.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (UserId, SessionId)
//! - [`clock`] - Injectable time source (Clock, SystemClock, FixedClock)
//!
//! # Example
//!
//! ```
//! use keygate_core::{Clock, SystemClock, UserId};
//!
//! let user_id = UserId::new();
//! let now = SystemClock.now();
//! println!("user {user_id} created at {now}");
//! ```

pub mod clock;
pub mod ids;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ids::{ParseIdError, SessionId, UserId};
