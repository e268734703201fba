//! Session Token Composer.
//!
//! Embeds a resolved identity into a signed (HS256) session token, and signs
//! the short-lived pending-SSO token carried between an SSO redirect and its
//! callback.
//!
//! # Invariants
//!
//! - Identity fields are written once at sign-in. [`SessionTokenComposer::refresh`]
//!   re-signs the same fields with a new validity window; nothing re-derives
//!   them from upstream systems.
//! - No token is ever produced with an empty user ID or email.
//! - Session and pending-SSO tokens use distinct audiences, so one can never
//!   be replayed as the other.

use crate::config::SessionConfig;
use crate::constants::MAX_SESSION_AGE_SECS;
use crate::error::{AuthError, Result};
use crate::state::{
    OAuthProvider, PendingSso, ProviderTokens, Role, SessionCompleteness, TenantId, UserId,
    UserIdentity, VerifiedIdentity,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

const SESSION_AUDIENCE: &str = "portal.session";
const SSO_AUDIENCE: &str = "portal.sso";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID.
    pub sub: String,

    /// Email address.
    pub email: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Role.
    pub role: Role,

    /// Tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Brand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Identity source (`oidc_password`, `legacy`, `sso:<p>`, `social:<p>`).
    pub provider: String,

    /// Upstream access token.
    pub access_token: String,

    /// Upstream refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Upstream access token expiry (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<i64>,

    /// Set when the identity could not be fully bridged.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,

    /// Audience.
    pub aud: String,

    /// Issued at (unix seconds).
    pub iat: i64,

    /// Expires at (unix seconds).
    pub exp: i64,
}

impl SessionClaims {
    /// The identity recorded in the token.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: UserId(self.sub.clone()),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            tenant_id: self.tenant_id.clone().map(TenantId),
            brand: self.brand.clone(),
            image: self.image.clone(),
        }
    }

    /// Upstream tokens recorded in the session.
    #[must_use]
    pub fn provider_tokens(&self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self
                .access_token_expires_at
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        }
    }

    /// Session completeness.
    #[must_use]
    pub const fn completeness(&self) -> SessionCompleteness {
        if self.degraded {
            SessionCompleteness::Degraded
        } else {
            SessionCompleteness::Complete
        }
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }
}

/// A signed session token together with its decoded claims.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// Encoded JWT (cookie value).
    pub token: String,

    /// Decoded claims.
    pub claims: SessionClaims,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("sub", &self.claims.sub)
            .field("provider", &self.claims.provider)
            .field("exp", &self.claims.exp)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingSsoClaims {
    state: String,
    provider: OAuthProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_url: Option<String>,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session and pending-SSO tokens.
#[derive(Clone)]
pub struct SessionTokenComposer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
    update_age: Duration,
    sso_state_ttl: Duration,
}

impl SessionTokenComposer {
    /// Create a composer from session configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            max_age: bounded_age(config.max_age_secs),
            update_age: bounded_age(config.update_age_secs),
            sso_state_ttl: bounded_age(config.sso_state_ttl_secs),
        }
    }

    /// Session lifetime.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Pending-SSO lifetime.
    #[must_use]
    pub const fn sso_state_ttl(&self) -> Duration {
        self.sso_state_ttl
    }

    /// Compose a session for whichever identity fired.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthenticationFailed`] if there is no identity, or it
    ///   lacks an ID or email.
    /// - [`AuthError::TokenSigning`] if signing fails.
    pub fn compose(&self, identity: Option<&VerifiedIdentity>) -> Result<SessionToken> {
        self.compose_at(identity, Utc::now())
    }

    /// Compose a session as if issued at `issued_at`.
    ///
    /// # Errors
    ///
    /// See [`SessionTokenComposer::compose`].
    pub fn compose_at(
        &self,
        identity: Option<&VerifiedIdentity>,
        issued_at: DateTime<Utc>,
    ) -> Result<SessionToken> {
        let verified = identity.ok_or(AuthError::AuthenticationFailed)?;
        let user = &verified.identity;

        if user.id.0.trim().is_empty() || user.email.trim().is_empty() {
            tracing::warn!(source = %verified.source.as_claim(), "Refusing to compose a session without id or email");
            return Err(AuthError::AuthenticationFailed);
        }

        let claims = SessionClaims {
            sub: user.id.0.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            role: user.role,
            tenant_id: user.tenant_id.as_ref().map(|t| t.0.clone()),
            brand: user.brand.clone(),
            provider: verified.source.as_claim(),
            access_token: verified.tokens.access_token.clone(),
            refresh_token: verified.tokens.refresh_token.clone(),
            access_token_expires_at: verified.tokens.expires_at.map(|t| t.timestamp()),
            degraded: verified.completeness == SessionCompleteness::Degraded,
            aud: SESSION_AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: expiry(issued_at, self.max_age)?,
        };

        self.sign(claims)
    }

    /// Re-sign the same identity fields with a fresh validity window.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenSigning`] if signing fails.
    pub fn refresh(&self, claims: &SessionClaims) -> Result<SessionToken> {
        self.refresh_at(claims, Utc::now())
    }

    /// Re-sign as if at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenSigning`] if signing fails.
    pub fn refresh_at(&self, claims: &SessionClaims, now: DateTime<Utc>) -> Result<SessionToken> {
        let mut refreshed = claims.clone();
        refreshed.iat = now.timestamp();
        refreshed.exp = expiry(now, self.max_age)?;
        self.sign(refreshed)
    }

    /// Returns `true` once the token is older than the update age.
    #[must_use]
    pub fn needs_refresh(&self, claims: &SessionClaims, now: DateTime<Utc>) -> bool {
        now.timestamp() - claims.iat >= self.update_age.num_seconds()
    }

    /// Verify a session token's signature, audience and expiry.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionExpired`] if the token has expired.
    /// - [`AuthError::InvalidSessionToken`] for anything else.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation(SESSION_AUDIENCE))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::SessionExpired,
                _ => AuthError::InvalidSessionToken,
            })?;
        Ok(data.claims)
    }

    /// Sign a pending-SSO record; it expires after the SSO state TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenSigning`] if signing fails.
    pub fn sign_pending_sso(&self, pending: &PendingSso) -> Result<String> {
        let claims = PendingSsoClaims {
            state: pending.state.clone(),
            provider: pending.provider,
            callback_url: pending.callback_url.clone(),
            aud: SSO_AUDIENCE.to_string(),
            iat: pending.initiated_at.timestamp(),
            exp: expiry(pending.initiated_at, self.sso_state_ttl)?,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Verify a pending-SSO token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::OAuthStateInvalid`] if the token is forged,
    /// expired or not a pending-SSO token.
    pub fn verify_pending_sso(&self, token: &str) -> Result<PendingSso> {
        let data = decode::<PendingSsoClaims>(token, &self.decoding_key, &validation(SSO_AUDIENCE))
            .map_err(|_| AuthError::OAuthStateInvalid)?;
        let claims = data.claims;
        Ok(PendingSso {
            state: claims.state,
            provider: claims.provider,
            callback_url: claims.callback_url,
            initiated_at: Utc
                .timestamp_opt(claims.iat, 0)
                .single()
                .ok_or(AuthError::OAuthStateInvalid)?,
        })
    }

    fn sign(&self, claims: SessionClaims) -> Result<SessionToken> {
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        Ok(SessionToken { token, claims })
    }
}

/// Ages outside the configurable range are clamped into it.
fn bounded_age(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_SESSION_AGE_SECS))
}

fn expiry(from: DateTime<Utc>, age: Duration) -> Result<i64> {
    from.checked_add_signed(age)
        .map(|at| at.timestamp())
        .ok_or_else(|| AuthError::TokenSigning("token expiry out of range".to_string()))
}

impl fmt::Debug for SessionTokenComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenComposer")
            .field("max_age", &self.max_age)
            .field("update_age", &self.update_age)
            .field("sso_state_ttl", &self.sso_state_ttl)
            .finish_non_exhaustive()
    }
}

fn validation(audience: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "aud"]);
    validation
}
