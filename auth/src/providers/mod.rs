//! Upstream identity systems.
//!
//! This module defines traits for every external system the sign-in flow
//! talks to, together with their HTTP implementations. The components and
//! the flow executor depend only on the traits, so tests run against the
//! in-memory mocks in [`crate::mocks`].
//!
//! ```text
//!   credentials ──▶ CredentialBackend (OIDC password grant, legacy login)
//!   SSO redirect ──▶ OAuth2Provider (authorize, code exchange, userinfo)
//!   social claims ──▶ SocialRegistry (gateway social-login endpoint)
//! ```
//!
//! Implementations never return passwords or tokens in errors or logs.

use crate::error::{AuthError, Result};
use crate::state::{ProviderTokens, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod authentik;
pub mod credentials;
pub mod gateway;
pub mod legacy;
pub mod oauth;
pub mod oauth_client;
pub mod social;

pub use authentik::OidcPasswordBackend;
pub use credentials::{CredentialBackend, CredentialOutcome, HttpCredentialBackend};
pub use gateway::GatewaySocialRegistry;
pub use legacy::LegacyAuthBackend;
pub use oauth::{OAuth2Provider, OAuthTokenResponse};
pub use oauth_client::{HttpOAuthClient, HttpOAuthProviders, OAuthEndpoints};
pub use social::SocialRegistry;

/// Claims about a user as reported by an identity provider.
///
/// Normalized from OIDC userinfo documents and from social provider profile
/// APIs, which disagree on field names (`sub`/`id`, `picture`/`avatar_url`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityClaims {
    /// Subject (provider-scoped user ID).
    pub sub: String,

    /// Email address.
    pub email: Option<String>,

    /// Whether the provider verified the email (if reported).
    pub email_verified: Option<bool>,

    /// Full name.
    pub name: Option<String>,

    /// Username.
    pub preferred_username: Option<String>,

    /// Group memberships.
    pub groups: Vec<String>,

    /// Tenant (first-party IdP only).
    pub tenant_id: Option<String>,

    /// Brand (first-party IdP only).
    pub brand: Option<String>,

    /// Avatar URL.
    pub picture: Option<String>,
}

impl IdentityClaims {
    /// Normalize a provider profile document.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedResponse`] if the document is not an
    /// object or carries no subject.
    pub fn from_profile(profile: &Value) -> Result<Self> {
        let object = profile
            .as_object()
            .ok_or_else(|| AuthError::MalformedResponse("profile is not an object".to_string()))?;

        let text = |key: &str| -> Option<String> {
            match object.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };

        let sub = text("sub")
            .or_else(|| text("id"))
            .ok_or_else(|| AuthError::MalformedResponse("profile has no subject".to_string()))?;

        let groups = object
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            sub,
            email: text("email").or_else(|| text("mail")),
            email_verified: object.get("email_verified").and_then(Value::as_bool),
            name: text("name"),
            preferred_username: text("preferred_username").or_else(|| text("login")),
            groups,
            tenant_id: text("tenant_id"),
            brand: text("brand"),
            picture: text("picture").or_else(|| text("avatar_url")),
        })
    }

    /// Email usable for bridging: present, and not explicitly unverified.
    #[must_use]
    pub fn usable_email(&self) -> Option<&str> {
        if self.email_verified == Some(false) {
            return None;
        }
        self.email.as_deref().filter(|e| !e.is_empty())
    }

    /// Display name: `name`, then `preferred_username`.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.name.clone().or_else(|| self.preferred_username.clone())
    }
}

/// User record returned by the legacy auth service and the gateway.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ServiceUser {
    /// `name`, then `first_name last_name`, then the email.
    pub(crate) fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() { self.email.clone() } else { joined }
    }
}

/// Tenant record returned by the legacy auth service and the gateway.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceTenant {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub brand: Option<String>,
}

/// Login response shared by the legacy auth service and the gateway.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceLoginResponse {
    pub user: ServiceUser,
    #[serde(default)]
    pub tenant: Option<ServiceTenant>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl ServiceLoginResponse {
    pub(crate) fn user_id(&self) -> UserId {
        UserId(self.user.id.clone())
    }

    pub(crate) fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.as_ref().map(|t| TenantId(t.id.clone()))
    }

    pub(crate) fn brand(&self) -> Option<String> {
        self.tenant.as_ref().and_then(|t| t.brand.clone())
    }

    pub(crate) fn tokens(&self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: expires_at(self.expires_in),
        }
    }
}

/// Convert a relative `expires_in` into an absolute timestamp.
pub(crate) fn expires_at(expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .filter(|secs| *secs > 0)
        .and_then(chrono::Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
