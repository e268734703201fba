//! Sign-in state types.
//!
//! This module defines the data model relayed by the sign-in flow and the
//! state the sign-in reducer operates on. All types are `Clone` so a flow can
//! be inspected or replayed in tests.

use crate::constants::login_methods;
use crate::error::AuthError;
use crate::session::SessionToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Identifier of a user in the external identity store.
///
/// Identity systems disagree on id formats (OIDC subjects, numeric legacy
/// ids, gateway UUIDs), so the id is kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the tenant a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

// ═══════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════

/// Role carried by a session. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrative role (may be redirected to the admin application).
    Admin,
    /// Default role.
    #[default]
    User,
}

impl Role {
    /// Get the role name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Returns `true` for elevated roles.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Email/password pair submitted by the login form.
///
/// Never persisted and never logged: `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
}

impl Credential {
    /// Create a credential.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check that both fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] naming the first empty field.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.email.trim().is_empty() {
            return Err(AuthError::MissingCredential { field: "email" });
        }
        if self.password.is_empty() {
            return Err(AuthError::MissingCredential { field: "password" });
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Normalized user identity relayed from an identity system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// User ID.
    pub id: UserId,

    /// Email address.
    pub email: String,

    /// Display name.
    pub name: Option<String>,

    /// Role.
    pub role: Role,

    /// Tenant (absent for degraded sessions and tenant-less accounts).
    pub tenant_id: Option<TenantId>,

    /// Brand the tenant belongs to.
    pub brand: Option<String>,

    /// Avatar URL.
    pub image: Option<String>,
}

/// Tokens issued by the identity system that resolved the user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokens {
    /// Access token.
    pub access_token: String,

    /// Refresh token (if issued).
    pub refresh_token: Option<String>,

    /// Access token expiration (if reported).
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Providers and sources
// ═══════════════════════════════════════════════════════════════════════

/// Browser-redirect sign-in provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// First-party SSO (Authentik OIDC).
    Authentik,
    /// Google OAuth.
    Google,
    /// GitHub OAuth.
    GitHub,
    /// Microsoft OAuth.
    Microsoft,
}

impl OAuthProvider {
    /// Get the provider name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authentik => "authentik",
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Microsoft => "microsoft",
        }
    }

    /// Human-readable provider name for the login page.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Authentik => "Single Sign-On",
            Self::Google => "Google",
            Self::GitHub => "GitHub",
            Self::Microsoft => "Microsoft",
        }
    }

    /// Returns `true` for the trusted first-party SSO provider, whose claims
    /// are authoritative and need no registration round-trip.
    #[must_use]
    pub const fn is_first_party(&self) -> bool {
        matches!(self, Self::Authentik)
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "authentik" => Ok(Self::Authentik),
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            "microsoft" | "azure-ad" => Ok(Self::Microsoft),
            _ => Err(AuthError::InvalidOAuthProvider),
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentitySource {
    /// OIDC password grant.
    OidcPassword,
    /// Legacy auth service.
    Legacy,
    /// First-party SSO redirect.
    Sso(OAuthProvider),
    /// Social provider bridged through the registration endpoint.
    Social(OAuthProvider),
}

impl IdentitySource {
    /// Value stored in the session's `provider` claim.
    #[must_use]
    pub fn as_claim(&self) -> String {
        match self {
            Self::OidcPassword => login_methods::OIDC_PASSWORD.to_string(),
            Self::Legacy => login_methods::LEGACY.to_string(),
            Self::Sso(provider) => format!("{}{}", login_methods::SSO_PREFIX, provider.as_str()),
            Self::Social(provider) => {
                format!("{}{}", login_methods::SOCIAL_PREFIX, provider.as_str())
            }
        }
    }
}

/// Whether the session carries a fully bridged identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCompleteness {
    /// Identity fully resolved.
    #[default]
    Complete,
    /// Social bridging failed and the degrade policy built the identity from
    /// the provider profile alone.
    Degraded,
}

/// Identity established by the verifier or the bridge, with its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// The identity.
    pub identity: UserIdentity,

    /// Tokens from the resolving system.
    pub tokens: ProviderTokens,

    /// Path that produced the identity.
    pub source: IdentitySource,

    /// Completeness of the identity.
    pub completeness: SessionCompleteness,
}

// ═══════════════════════════════════════════════════════════════════════
// Flow state
// ═══════════════════════════════════════════════════════════════════════

/// Phase of a single sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInPhase {
    /// Nothing submitted yet.
    #[default]
    Anonymous,
    /// Credentials submitted, verification pending.
    CredentialsSubmitted,
    /// SSO redirect issued or callback being processed.
    SsoInitiated,
    /// An identity has been resolved.
    IdentityResolved,
    /// A signed session exists.
    SessionEstablished,
    /// The redirect destination is known. Terminal success.
    Redirected,
    /// Credentials path failed. Terminal failure.
    CredentialsRejected,
    /// SSO path failed. Terminal failure.
    SsoFailed,
}

impl SignInPhase {
    /// Returns `true` for terminal failure phases.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::CredentialsRejected | Self::SsoFailed)
    }
}

/// How the current attempt started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignInMethod {
    /// Email/password form.
    Credentials,
    /// Browser redirect through a provider.
    Sso(OAuthProvider),
}

/// SSO attempt carried between the redirect and the callback.
///
/// Stored client-side in a signed short-lived cookie; `state` doubles as the
/// OAuth CSRF parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSso {
    /// CSRF state parameter (256 bits, base64url).
    pub state: String,

    /// Provider the browser was sent to.
    pub provider: OAuthProvider,

    /// Callback URL requested when the attempt began (unvalidated).
    pub callback_url: Option<String>,

    /// When the attempt began.
    pub initiated_at: DateTime<Utc>,
}

/// State of one sign-in attempt.
///
/// A fresh state is created per request; nothing carries over between
/// attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInState {
    /// Current phase.
    pub phase: SignInPhase,

    /// How the attempt started.
    pub method: Option<SignInMethod>,

    /// Callback URL requested by the caller (unvalidated).
    pub callback_url: Option<String>,

    /// Pending SSO attempt (between redirect and callback).
    pub pending_sso: Option<PendingSso>,

    /// Provider authorization URL to send the browser to.
    pub authorization_url: Option<String>,

    /// Resolved identity.
    pub identity: Option<VerifiedIdentity>,

    /// Signed session.
    pub session: Option<SessionToken>,

    /// Final redirect destination.
    pub redirect_to: Option<String>,

    /// Failure that ended the attempt.
    pub error: Option<AuthError>,
}

impl SignInState {
    /// State for an SSO callback, restored from the pending-SSO cookie.
    #[must_use]
    pub fn resume_sso(pending: PendingSso) -> Self {
        Self {
            phase: SignInPhase::SsoInitiated,
            method: Some(SignInMethod::Sso(pending.provider)),
            callback_url: pending.callback_url.clone(),
            pending_sso: Some(pending),
            ..Self::default()
        }
    }

    /// Role of the resolved identity, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|verified| verified.identity.role)
    }
}
