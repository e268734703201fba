//! First-party OIDC password grant (Authentik).

use super::{expires_at, CredentialBackend, CredentialOutcome, IdentityClaims};
use crate::config::OidcConfig;
use crate::error::AuthError;
use crate::roles::{GroupRoleMapper, RoleMapper};
use crate::state::{
    Credential, IdentitySource, ProviderTokens, SessionCompleteness, TenantId, UserId,
    UserIdentity, VerifiedIdentity,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Verifies credentials with the OIDC resource-owner password grant, then
/// reads the user's claims from the userinfo endpoint.
///
/// # Example
///
/// ```no_run
/// use portal_auth::config::OidcConfig;
/// use portal_auth::providers::OidcPasswordBackend;
///
/// let oidc = OidcConfig::new("https://sso.example.com", "portal").with_client_secret("secret");
/// let backend = OidcPasswordBackend::new(oidc, reqwest::Client::new());
/// ```
#[derive(Clone)]
pub struct OidcPasswordBackend {
    config: OidcConfig,
    http_client: Client,
    role_mapper: Arc<dyn RoleMapper>,
}

impl OidcPasswordBackend {
    /// Create a backend. Roles default to admin-group membership.
    #[must_use]
    pub fn new(config: OidcConfig, http_client: Client) -> Self {
        let role_mapper = Arc::new(GroupRoleMapper::new(config.admin_group.clone()));
        Self {
            config,
            http_client,
            role_mapper,
        }
    }

    /// Replace the role mapper.
    #[must_use]
    pub fn with_role_mapper(mut self, role_mapper: Arc<dyn RoleMapper>) -> Self {
        self.role_mapper = role_mapper;
        self
    }

    async fn password_grant(&self, credential: &Credential) -> Result<TokenResponse, CredentialOutcome> {
        let Some(client_secret) = self.config.client_secret.as_deref() else {
            return Err(CredentialOutcome::Inconclusive(AuthError::ConfigurationGap(
                "OIDC client secret is not configured".to_string(),
            )));
        };

        let params = [
            ("grant_type", "password"),
            ("username", credential.email.trim()),
            ("password", credential.password.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", client_secret),
            ("scope", self.config.scopes.as_str()),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                CredentialOutcome::Inconclusive(AuthError::UpstreamUnavailable(e.without_url().to_string()))
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(|e| {
                CredentialOutcome::Inconclusive(AuthError::MalformedResponse(e.to_string()))
            });
        }

        let error = response
            .json::<TokenErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();

        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) && error == "invalid_grant" {
            return Err(CredentialOutcome::Rejected);
        }

        tracing::warn!(status = status.as_u16(), error = %error, "OIDC password grant gave no conclusive answer");
        Err(CredentialOutcome::Inconclusive(AuthError::UpstreamRejected {
            status: status.as_u16(),
        }))
    }

    async fn userinfo(&self, access_token: &str) -> Result<IdentityClaims, AuthError> {
        let response = self
            .http_client
            .get(self.config.userinfo_endpoint())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::UpstreamRejected {
                status: response.status().as_u16(),
            });
        }

        let profile: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        IdentityClaims::from_profile(&profile)
    }
}

impl CredentialBackend for OidcPasswordBackend {
    fn name(&self) -> &'static str {
        "oidc"
    }

    async fn verify(&self, credential: &Credential) -> CredentialOutcome {
        let tokens = match self.password_grant(credential).await {
            Ok(tokens) => tokens,
            Err(outcome) => return outcome,
        };

        let claims = match self.userinfo(&tokens.access_token).await {
            Ok(claims) => claims,
            Err(error) => {
                tracing::warn!(error = %error, "OIDC userinfo lookup failed after password grant");
                return CredentialOutcome::Inconclusive(error);
            }
        };

        let email = claims
            .email
            .clone()
            .unwrap_or_else(|| credential.email.trim().to_string());

        let identity = UserIdentity {
            id: UserId(claims.sub.clone()),
            name: Some(claims.display_name().unwrap_or_else(|| email.clone())),
            email,
            role: self.role_mapper.map_role(&claims),
            tenant_id: claims.tenant_id.clone().map(TenantId),
            brand: claims.brand.clone(),
            image: claims.picture.clone(),
        };

        CredentialOutcome::Verified(Box::new(VerifiedIdentity {
            identity,
            tokens: ProviderTokens {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: expires_at(tokens.expires_in),
            },
            source: IdentitySource::OidcPassword,
            completeness: SessionCompleteness::Complete,
        }))
    }
}

impl fmt::Debug for OidcPasswordBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcPasswordBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Token endpoint success body.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token endpoint error body (RFC 6749 §5.2).
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_client_secret_is_inconclusive() {
        let backend = OidcPasswordBackend::new(
            OidcConfig::new("http://127.0.0.1:1", "portal"),
            Client::new(),
        );

        let outcome = backend.verify(&Credential::new("a@x.com", "pw")).await;

        assert!(matches!(
            outcome,
            CredentialOutcome::Inconclusive(AuthError::ConfigurationGap(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let backend = OidcPasswordBackend::new(
            OidcConfig::new("https://sso.example.com", "portal").with_client_secret("hunter2"),
            Client::new(),
        );
        assert!(!format!("{backend:?}").contains("hunter2"));
    }
}
