//! Purpose tokens minted and consumed by identity workflows.
//!
//! Three short-lived bearer tokens share one claim set: [`EmailVerification`]
//! proves control of a mailbox, [`PasswordReset`] authorizes a password
//! change, and [`Invitation`] combines both so a newly invited user can
//! verify their address and set a first password in one step.
//!
//! A value of one of these types exists only if it was minted by `new` or
//! survived `parse_and_verify`, so the accessors never fail.

use chrono::Duration;
use url::Url;

use keygate_core::{Clock, UserId};

use crate::claims::{
    ClaimSet, PURPOSE_EMAIL_VERIFICATION, PURPOSE_INVITATION, PURPOSE_PASSWORD_RESET,
};
use crate::error::AuthError;
use crate::jwt::{decode_claims, sign_claims, KeySet, SigningKey};

/// Clock skew tolerance applied to expiry checks, in seconds.
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

fn build_claims(
    user_id: UserId,
    issuer: &str,
    purpose: &str,
    ttl: Duration,
    clock: &dyn Clock,
) -> ClaimSet {
    let now = clock.now();
    ClaimSet {
        sub: user_id.to_string(),
        iss: issuer.to_string(),
        aud: None,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        purpose: Some(purpose.to_string()),
        email: None,
        callback: None,
        password: None,
    }
}

fn assert_not_expired(claims: &ClaimSet, clock: &dyn Clock) -> Result<(), AuthError> {
    if claims.exp <= 0 {
        return Err(AuthError::MissingClaim("exp".into()));
    }
    if claims.exp < clock.now().timestamp() - EXPIRY_LEEWAY_SECS {
        return Err(AuthError::TokenExpired);
    }
    Ok(())
}

fn assert_purpose(claims: &ClaimSet, expected: &str) -> Result<(), AuthError> {
    match claims.purpose.as_deref() {
        None => Err(AuthError::MissingClaim("purpose".into())),
        Some(purpose) if purpose == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidToken("token purpose mismatch".into())),
    }
}

fn assert_subject(claims: &ClaimSet) -> Result<UserId, AuthError> {
    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }
    claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidToken("subject is not a valid user ID".into()))
}

fn required_claim<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AuthError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthError::MissingClaim(name.into())),
    }
}

fn parse_callback(raw: &str) -> Result<Url, AuthError> {
    Url::parse(raw).map_err(|_| AuthError::InvalidCallback(raw.to_string()))
}

/// A signed token proving the bearer clicked a verification link sent to
/// the email address in the token.
#[derive(Debug, Clone)]
pub struct EmailVerification {
    claims: ClaimSet,
    user_id: UserId,
    callback: Url,
}

impl EmailVerification {
    /// Mint a verification token for `email`, redirecting to `callback`
    /// once the address is confirmed.
    #[must_use]
    pub fn new(
        user_id: UserId,
        email: &str,
        client_id: &str,
        issuer: &str,
        callback: &Url,
        ttl: Duration,
        clock: &dyn Clock,
    ) -> Self {
        let mut claims = build_claims(user_id, issuer, PURPOSE_EMAIL_VERIFICATION, ttl, clock);
        claims.aud = Some(client_id.to_string());
        claims.email = Some(email.to_string());
        claims.callback = Some(callback.to_string());
        Self {
            claims,
            user_id,
            callback: callback.clone(),
        }
    }

    /// Sign into a compact token string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if encoding fails.
    pub fn sign(&self, key: &SigningKey) -> Result<String, AuthError> {
        sign_claims(&self.claims, key)
    }

    /// Parse a token string and verify it is a live email verification
    /// token from `issuer`.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidToken` on signature or structural failure
    /// - `AuthError::TokenExpired` when `exp` has passed
    /// - `AuthError::MissingClaim` when a required claim is absent or empty
    /// - `AuthError::InvalidCallback` when the callback does not parse
    pub fn parse_and_verify(
        token: &str,
        issuer: &str,
        keys: &KeySet,
        clock: &dyn Clock,
    ) -> Result<Self, AuthError> {
        let claims = decode_claims(token, issuer, keys)?;
        assert_not_expired(&claims, clock)?;
        assert_purpose(&claims, PURPOSE_EMAIL_VERIFICATION)?;
        let user_id = assert_subject(&claims)?;
        required_claim(&claims.aud, "aud")?;
        required_claim(&claims.email, "email")?;
        let callback = parse_callback(required_claim(&claims.callback, "callback")?)?;
        Ok(Self {
            claims,
            user_id,
            callback,
        })
    }

    /// The user whose email is being verified.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The email address being verified.
    #[must_use]
    pub fn email(&self) -> &str {
        self.claims.email.as_deref().unwrap_or_default()
    }

    /// Redirect target once verification completes.
    #[must_use]
    pub fn callback(&self) -> &Url {
        &self.callback
    }

    /// The client the token was minted for.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.claims.aud.as_deref().unwrap_or_default()
    }
}

/// A signed token authorizing a password change.
///
/// The claim set embeds the password hash that was current at mint time;
/// a change made out-of-band since then invalidates the token.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    claims: ClaimSet,
    user_id: UserId,
    callback: Option<Url>,
}

impl PasswordReset {
    /// Mint a reset token. `client` carries the requesting client ID and
    /// its callback together; a reset initiated outside any client (for
    /// example from an operator console) passes `None` and the minted
    /// token carries neither an audience nor a callback.
    #[must_use]
    pub fn new(
        user_id: UserId,
        old_password_hash: &str,
        issuer: &str,
        client: Option<(&str, &Url)>,
        ttl: Duration,
        clock: &dyn Clock,
    ) -> Self {
        let mut claims = build_claims(user_id, issuer, PURPOSE_PASSWORD_RESET, ttl, clock);
        claims.password = Some(old_password_hash.to_string());
        let callback = match client {
            Some((client_id, url)) => {
                claims.aud = Some(client_id.to_string());
                claims.callback = Some(url.to_string());
                Some(url.clone())
            }
            None => None,
        };
        Self {
            claims,
            user_id,
            callback,
        }
    }

    /// Sign into a compact token string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if encoding fails.
    pub fn sign(&self, key: &SigningKey) -> Result<String, AuthError> {
        sign_claims(&self.claims, key)
    }

    /// Parse a token string and verify it is a live password reset token
    /// from `issuer`.
    ///
    /// The audience is checked only when a callback claim is present; a
    /// reset minted without a callback carries no audience to check.
    ///
    /// # Errors
    ///
    /// See [`EmailVerification::parse_and_verify`].
    pub fn parse_and_verify(
        token: &str,
        issuer: &str,
        keys: &KeySet,
        clock: &dyn Clock,
    ) -> Result<Self, AuthError> {
        let claims = decode_claims(token, issuer, keys)?;
        assert_not_expired(&claims, clock)?;
        assert_purpose(&claims, PURPOSE_PASSWORD_RESET)?;
        let user_id = assert_subject(&claims)?;
        required_claim(&claims.password, "password")?;
        let callback = match claims.callback.as_deref() {
            Some(raw) if !raw.is_empty() => {
                required_claim(&claims.aud, "aud")?;
                Some(parse_callback(raw)?)
            }
            _ => None,
        };
        Ok(Self {
            claims,
            user_id,
            callback,
        })
    }

    /// The user whose password may be changed.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The password hash that was current when the token was minted.
    #[must_use]
    pub fn password(&self) -> &str {
        self.claims.password.as_deref().unwrap_or_default()
    }

    /// Redirect target once the password is changed, when the reset was
    /// initiated by a client.
    #[must_use]
    pub fn callback(&self) -> Option<&Url> {
        self.callback.as_ref()
    }

    /// The client the token was minted for, when a callback is carried.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.claims.aud.as_deref()
    }
}

/// A signed token inviting a user to verify their email address and set a
/// first password in a single step.
#[derive(Debug, Clone)]
pub struct Invitation {
    claims: ClaimSet,
    user_id: UserId,
    callback: Url,
}

impl Invitation {
    /// Mint an invitation token. Invitations are always client-initiated,
    /// so audience and callback are required.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        email: &str,
        old_password_hash: &str,
        issuer: &str,
        client_id: &str,
        callback: &Url,
        ttl: Duration,
        clock: &dyn Clock,
    ) -> Self {
        let mut claims = build_claims(user_id, issuer, PURPOSE_INVITATION, ttl, clock);
        claims.aud = Some(client_id.to_string());
        claims.email = Some(email.to_string());
        claims.callback = Some(callback.to_string());
        claims.password = Some(old_password_hash.to_string());
        Self {
            claims,
            user_id,
            callback: callback.clone(),
        }
    }

    /// Sign into a compact token string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if encoding fails.
    pub fn sign(&self, key: &SigningKey) -> Result<String, AuthError> {
        sign_claims(&self.claims, key)
    }

    /// Parse a token string and verify it is a live invitation token from
    /// `issuer`.
    ///
    /// # Errors
    ///
    /// See [`EmailVerification::parse_and_verify`].
    pub fn parse_and_verify(
        token: &str,
        issuer: &str,
        keys: &KeySet,
        clock: &dyn Clock,
    ) -> Result<Self, AuthError> {
        let claims = decode_claims(token, issuer, keys)?;
        assert_not_expired(&claims, clock)?;
        assert_purpose(&claims, PURPOSE_INVITATION)?;
        let user_id = assert_subject(&claims)?;
        required_claim(&claims.aud, "aud")?;
        required_claim(&claims.email, "email")?;
        required_claim(&claims.password, "password")?;
        let callback = parse_callback(required_claim(&claims.callback, "callback")?)?;
        Ok(Self {
            claims,
            user_id,
            callback,
        })
    }

    /// The invited user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The email address the invitation was sent to.
    #[must_use]
    pub fn email(&self) -> &str {
        self.claims.email.as_deref().unwrap_or_default()
    }

    /// The password hash that was current when the invitation was minted.
    #[must_use]
    pub fn password(&self) -> &str {
        self.claims.password.as_deref().unwrap_or_default()
    }

    /// Redirect target once the invitation is accepted.
    #[must_use]
    pub fn callback(&self) -> &Url {
        &self.callback
    }

    /// The client the invitation was minted for.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.claims.aud.as_deref().unwrap_or_default()
    }

    /// Resolve the invitation into the password reset it carries, for the
    /// set-first-password step.
    #[must_use]
    pub fn into_password_reset(self) -> PasswordReset {
        PasswordReset {
            claims: self.claims,
            user_id: self.user_id,
            callback: Some(self.callback),
        }
    }
}
