//! Claim set carried by workflow tokens.
//!
//! One serde struct covers the three token purposes (email verification,
//! password reset, invitation); purpose-specific fields are optional and
//! omitted from the encoded form when unset. Numeric timestamp claims
//! tolerate float-typed JSON values, since some JWT producers encode
//! `exp`/`iat` as floating point; floats are normalized to integer seconds
//! with round-half-up semantics.

use serde::{Deserialize, Deserializer, Serialize};

/// Purpose claim value for email verification tokens.
pub const PURPOSE_EMAIL_VERIFICATION: &str = "email_verification";

/// Purpose claim value for password reset tokens.
pub const PURPOSE_PASSWORD_RESET: &str = "password_reset";

/// Purpose claim value for invitation tokens.
pub const PURPOSE_INVITATION: &str = "invitation";

/// The signed claim set for a workflow token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject: the user ID the token refers to.
    pub sub: String,

    /// Issuer of the token.
    pub iss: String,

    /// Audience: the client ID the token was minted for. Omitted for
    /// password resets that carry no callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Expiry as Unix seconds.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub exp: i64,

    /// Issued-at as Unix seconds.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub iat: i64,

    /// Discriminator tying a token to the workflow it was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Email address being verified (email verification and invitations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Callback URL the caller is redirected to after the workflow step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,

    /// The password hash current at mint time (password resets and
    /// invitations). A concurrent-change guard, not a secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ClaimSet {
    /// Returns true if the purpose claim equals `purpose`.
    #[must_use]
    pub fn has_purpose(&self, purpose: &str) -> bool {
        self.purpose.as_deref() == Some(purpose)
    }
}

/// Normalize a float-typed timestamp to whole seconds, rounding half up.
pub(crate) fn normalize_timestamp(secs: f64) -> i64 {
    (secs + 0.5).floor() as i64
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = value
        .as_number()
        .ok_or_else(|| serde::de::Error::custom("timestamp claim must be a number"))?;

    if let Some(secs) = number.as_i64() {
        Ok(secs)
    } else if let Some(secs) = number.as_f64() {
        Ok(normalize_timestamp(secs))
    } else {
        Err(serde::de::Error::custom("timestamp claim out of range"))
    }
}
