//! Legacy auth service direct login.

use super::{CredentialBackend, CredentialOutcome, ServiceLoginResponse};
use crate::config::LegacyAuthConfig;
use crate::error::AuthError;
use crate::roles::role_from_service;
use crate::state::{Credential, IdentitySource, SessionCompleteness, UserIdentity, VerifiedIdentity};
use reqwest::{Client, StatusCode};
use serde::Serialize;

/// Verifies credentials against the legacy auth service.
#[derive(Debug, Clone)]
pub struct LegacyAuthBackend {
    config: LegacyAuthConfig,
    http_client: Client,
    remember_me: bool,
}

impl LegacyAuthBackend {
    /// Create a backend.
    #[must_use]
    pub const fn new(config: LegacyAuthConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
            remember_me: true,
        }
    }

    /// Set the `remember_me` flag sent with each login.
    ///
    /// Default: true
    #[must_use]
    pub const fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    platform: &'a str,
    remember_me: bool,
}

impl CredentialBackend for LegacyAuthBackend {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn verify(&self, credential: &Credential) -> CredentialOutcome {
        let request = LoginRequest {
            email: credential.email.trim(),
            password: &credential.password,
            platform: &self.config.platform,
            remember_me: self.remember_me,
        };

        let response = match self
            .http_client
            .post(self.config.login_endpoint())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return CredentialOutcome::Inconclusive(AuthError::UpstreamUnavailable(
                    e.without_url().to_string(),
                ));
            }
        };

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return CredentialOutcome::Rejected;
        }
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Legacy auth service returned an error status");
            return CredentialOutcome::Inconclusive(AuthError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body: ServiceLoginResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return CredentialOutcome::Inconclusive(AuthError::MalformedResponse(e.to_string()));
            }
        };

        let identity = UserIdentity {
            id: body.user_id(),
            email: body.user.email.clone(),
            name: Some(body.user.display_name()),
            role: role_from_service(body.user.role.as_deref()),
            tenant_id: body.tenant_id(),
            brand: body.brand(),
            image: body.user.avatar_url.clone(),
        };

        CredentialOutcome::Verified(Box::new(VerifiedIdentity {
            identity,
            tokens: body.tokens(),
            source: IdentitySource::Legacy,
            completeness: SessionCompleteness::Complete,
        }))
    }
}
