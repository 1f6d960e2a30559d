//! Input validation for identity operations.
//!
//! These predicates are enforced by the manager layer rather than the
//! storage layer, so they apply uniformly to every creation path.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum password length requirement, in bytes.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Email validation regex (simplified RFC 5322 mailbox).
/// Uses `LazyLock` for compile-once initialization. The regex pattern is
/// a constant, so the `expect()` here is acceptable - if this fails,
/// it's a programming error.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

/// Check an email address against the plain mailbox grammar.
///
/// Addresses carrying a display name part (`Jane <jane@example.com>`)
/// are rejected; only the bare `local@domain` form is accepted.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Check a password against the minimum strength policy.
#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
}
