//! Gateway social-login registry.

use super::{IdentityClaims, ServiceLoginResponse, SocialRegistry};
use crate::config::SocialBridgeConfig;
use crate::error::{AuthError, Result};
use crate::roles::role_from_service;
use crate::state::{
    IdentitySource, OAuthProvider, SessionCompleteness, UserIdentity, VerifiedIdentity,
};
use reqwest::Client;
use serde::Serialize;

/// Registers social sign-ins with the gateway's social-login endpoint.
#[derive(Debug, Clone)]
pub struct GatewaySocialRegistry {
    config: SocialBridgeConfig,
    http_client: Client,
}

impl GatewaySocialRegistry {
    /// Create a registry client.
    #[must_use]
    pub const fn new(config: SocialBridgeConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }
}

#[derive(Serialize)]
struct SocialLoginRequest<'a> {
    email: &'a str,
    provider: &'a str,
    secret: &'a str,
    platform: &'a str,
    name: Option<String>,
    avatar_url: Option<&'a str>,
}

impl SocialRegistry for GatewaySocialRegistry {
    async fn register(
        &self,
        provider: OAuthProvider,
        claims: &IdentityClaims,
    ) -> Result<VerifiedIdentity> {
        let Some(secret) = self.config.secret.as_deref() else {
            return Err(AuthError::ConfigurationGap(
                "social login secret is not configured".to_string(),
            ));
        };
        let Some(email) = claims.usable_email() else {
            return Err(AuthError::AuthenticationFailed);
        };

        let request = SocialLoginRequest {
            email,
            provider: provider.as_str(),
            secret,
            platform: &self.config.platform,
            name: claims.display_name(),
            avatar_url: claims.picture.as_deref(),
        };

        let response = self
            .http_client
            .post(self.config.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::error!(status, provider = provider.as_str(), "Social login registration failed");
            return Err(AuthError::UpstreamRejected { status });
        }

        let body: ServiceLoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let identity = UserIdentity {
            id: body.user_id(),
            email: body.user.email.clone(),
            name: Some(body.user.display_name()),
            role: role_from_service(body.user.role.as_deref()),
            tenant_id: body.tenant_id(),
            brand: body.brand(),
            image: body.user.avatar_url.clone().or_else(|| claims.picture.clone()),
        };

        Ok(VerifiedIdentity {
            identity,
            tokens: body.tokens(),
            source: IdentitySource::Social(provider),
            completeness: SessionCompleteness::Complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_secret_is_a_configuration_gap() {
        let registry = GatewaySocialRegistry::new(SocialBridgeConfig::new("http://127.0.0.1:1"), Client::new());
        let claims = IdentityClaims {
            sub: "g-1".to_string(),
            email: Some("a@x.com".to_string()),
            ..IdentityClaims::default()
        };

        let result = registry.register(OAuthProvider::Google, &claims).await;

        assert!(matches!(result, Err(AuthError::ConfigurationGap(_))));
    }
}
