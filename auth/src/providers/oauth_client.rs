//! HTTP OAuth 2.0 clients for the browser-redirect providers.

use super::{expires_at, IdentityClaims, OAuth2Provider, OAuthTokenResponse};
use crate::config::{AuthConfig, OidcConfig, SocialProviderConfig};
use crate::error::{AuthError, Result};
use crate::state::OAuthProvider;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

const CLIENT_USER_AGENT: &str = concat!("portal-auth/", env!("CARGO_PKG_VERSION"));

/// Endpoints and request options of one OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    /// Authorization endpoint (browser redirect).
    pub authorize_url: String,

    /// Token endpoint.
    pub token_url: String,

    /// Userinfo / profile endpoint.
    pub userinfo_url: String,

    /// Scopes to request.
    pub scopes: Vec<String>,

    /// Extra authorization query parameters.
    pub extra_params: Vec<(String, String)>,
}

impl OAuthEndpoints {
    fn new(authorize_url: impl Into<String>, token_url: impl Into<String>, userinfo_url: impl Into<String>, scopes: &str) -> Self {
        Self {
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
            userinfo_url: userinfo_url.into(),
            scopes: scopes.split_whitespace().map(ToString::to_string).collect(),
            extra_params: Vec::new(),
        }
    }

    fn with_param(mut self, key: &str, value: &str) -> Self {
        self.extra_params.push((key.to_string(), value.to_string()));
        self
    }
}

/// OAuth 2.0 authorization-code client for a single provider.
///
/// # Example
///
/// ```no_run
/// use portal_auth::providers::HttpOAuthClient;
///
/// let google = HttpOAuthClient::google("client-id", "client-secret", reqwest::Client::new());
/// ```
#[derive(Clone)]
pub struct HttpOAuthClient {
    provider: OAuthProvider,
    client_id: String,
    client_secret: Option<String>,
    endpoints: OAuthEndpoints,
    http_client: Client,
}

impl HttpOAuthClient {
    /// Client for the first-party OIDC provider.
    #[must_use]
    pub fn authentik(config: &OidcConfig, http_client: Client) -> Self {
        Self {
            provider: OAuthProvider::Authentik,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            endpoints: OAuthEndpoints::new(
                config.authorize_endpoint(),
                config.token_endpoint(),
                config.userinfo_endpoint(),
                &config.scopes,
            ),
            http_client,
        }
    }

    /// Google Identity Platform client (offline access, incremental scopes).
    #[must_use]
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>, http_client: Client) -> Self {
        Self {
            provider: OAuthProvider::Google,
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            endpoints: OAuthEndpoints::new(
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://openidconnect.googleapis.com/v1/userinfo",
                "openid email profile",
            )
            .with_param("access_type", "offline")
            .with_param("include_granted_scopes", "true"),
            http_client,
        }
    }

    /// GitHub OAuth app client.
    #[must_use]
    pub fn github(client_id: impl Into<String>, client_secret: impl Into<String>, http_client: Client) -> Self {
        Self {
            provider: OAuthProvider::GitHub,
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            endpoints: OAuthEndpoints::new(
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
                "https://api.github.com/user",
                "read:user user:email",
            ),
            http_client,
        }
    }

    /// Microsoft identity platform client.
    #[must_use]
    pub fn microsoft(
        tenant: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http_client: Client,
    ) -> Self {
        let base = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0");
        Self {
            provider: OAuthProvider::Microsoft,
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            endpoints: OAuthEndpoints::new(
                format!("{base}/authorize"),
                format!("{base}/token"),
                "https://graph.microsoft.com/oidc/userinfo",
                "openid email profile offline_access",
            ),
            http_client,
        }
    }

    /// Client for a configured social provider.
    #[must_use]
    pub fn from_social_config(config: &SocialProviderConfig, http_client: Client) -> Self {
        match config.provider {
            OAuthProvider::GitHub => Self::github(&config.client_id, &config.client_secret, http_client),
            OAuthProvider::Microsoft => Self::microsoft(
                config.tenant.as_deref().unwrap_or("common"),
                &config.client_id,
                &config.client_secret,
                http_client,
            ),
            OAuthProvider::Google | OAuthProvider::Authentik => {
                Self::google(&config.client_id, &config.client_secret, http_client)
            }
        }
    }

    /// Override the endpoints (self-hosted providers, tests).
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Provider served by this client.
    #[must_use]
    pub const fn provider(&self) -> OAuthProvider {
        self.provider
    }

    /// Endpoints in use.
    #[must_use]
    pub const fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    fn check_provider(&self, provider: OAuthProvider) -> Result<()> {
        if provider == self.provider {
            Ok(())
        } else {
            Err(AuthError::InvalidOAuthProvider)
        }
    }
}

impl OAuth2Provider for HttpOAuthClient {
    async fn build_authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        self.check_provider(provider)?;

        let scope = self.endpoints.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
        ];
        params.extend(
            self.endpoints
                .extra_params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Internal(format!("Failed to build URL: {e}")))?;

        Ok(format!("{}?{query}", self.endpoints.authorize_url))
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokenResponse> {
        self.check_provider(provider)?;

        let Some(client_secret) = self.client_secret.as_deref() else {
            return Err(AuthError::ConfigurationGap(format!(
                "{provider} client secret is not configured"
            )));
        };

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", client_secret),
        ];

        let response = self
            .http_client
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            tracing::warn!(provider = provider.as_str(), "Authorization code rejected");
            return Err(AuthError::OAuthCodeInvalid);
        }
        if !status.is_success() {
            tracing::error!(provider = provider.as_str(), status = status.as_u16(), "Token exchange failed");
            return Err(AuthError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        // GitHub reports a bad code with 200 and an `error` field.
        if let Some(error) = body.error {
            tracing::warn!(provider = provider.as_str(), error = %error, "Authorization code rejected");
            return Err(AuthError::OAuthCodeInvalid);
        }

        let access_token = body
            .access_token
            .ok_or_else(|| AuthError::MalformedResponse("token response has no access_token".to_string()))?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: body.refresh_token,
            expires_at: expires_at(body.expires_in),
        })
    }

    async fn fetch_user_info(&self, provider: OAuthProvider, access_token: &str) -> Result<IdentityClaims> {
        self.check_provider(provider)?;

        let response = self
            .http_client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::error!(provider = provider.as_str(), status, "UserInfo request failed");
            return Err(AuthError::UpstreamRejected { status });
        }

        let profile: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        IdentityClaims::from_profile(&profile)
    }
}

impl fmt::Debug for HttpOAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpOAuthClient")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Token endpoint response, tolerant of provider differences.
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

/// Every configured browser-redirect provider behind one [`OAuth2Provider`].
#[derive(Debug, Clone, Default)]
pub struct HttpOAuthProviders {
    clients: HashMap<OAuthProvider, HttpOAuthClient>,
}

impl HttpOAuthProviders {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for the first-party IdP and every enabled social
    /// provider with credentials.
    #[must_use]
    pub fn from_config(config: &AuthConfig, http_client: &Client) -> Self {
        let mut providers = Self::new();
        if let Some(oidc) = &config.oidc {
            providers = providers.with_client(HttpOAuthClient::authentik(oidc, http_client.clone()));
        }
        for credentials in &config.social_providers {
            if config.strategy.social_providers.contains(&credentials.provider) {
                providers = providers
                    .with_client(HttpOAuthClient::from_social_config(credentials, http_client.clone()));
            }
        }
        providers
    }

    /// Add (or replace) a client.
    #[must_use]
    pub fn with_client(mut self, client: HttpOAuthClient) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    /// Returns `true` if a client exists for the provider.
    #[must_use]
    pub fn supports(&self, provider: OAuthProvider) -> bool {
        self.clients.contains_key(&provider)
    }

    fn client(&self, provider: OAuthProvider) -> Result<&HttpOAuthClient> {
        self.clients.get(&provider).ok_or(AuthError::InvalidOAuthProvider)
    }
}

impl OAuth2Provider for HttpOAuthProviders {
    async fn build_authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        self.client(provider)?
            .build_authorization_url(provider, state, redirect_uri)
            .await
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokenResponse> {
        self.client(provider)?
            .exchange_code(provider, code, redirect_uri)
            .await
    }

    async fn fetch_user_info(&self, provider: OAuthProvider, access_token: &str) -> Result<IdentityClaims> {
        self.client(provider)?.fetch_user_info(provider, access_token).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_google_authorization_url() {
        let google = HttpOAuthClient::google("test_client_id", "test_secret", Client::new());

        let url = google
            .build_authorization_url(
                OAuthProvider::Google,
                "test_state_123",
                "http://localhost:3000/api/auth/callback/google",
            )
            .await
            .unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fauth%2Fcallback%2Fgoogle"
        ));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid+email+profile"));
        assert!(url.contains("state=test_state_123"));
        assert!(url.contains("access_type=offline"));
    }

    #[tokio::test]
    async fn test_authentik_authorization_url() {
        let oidc = OidcConfig::new("https://sso.example.com/", "portal");
        let client = HttpOAuthClient::authentik(&oidc, Client::new());

        let url = client
            .build_authorization_url(OAuthProvider::Authentik, "s", "https://portal/cb")
            .await
            .unwrap();

        assert!(url.starts_with("https://sso.example.com/application/o/authorize/?"));
        assert!(url.contains("scope=openid+email+profile+offline_access"));
    }

    #[tokio::test]
    async fn test_wrong_provider_returns_error() {
        let google = HttpOAuthClient::google("id", "secret", Client::new());

        let result = google
            .build_authorization_url(OAuthProvider::GitHub, "state", "http://localhost/callback")
            .await;

        assert!(matches!(result, Err(AuthError::InvalidOAuthProvider)));
    }

    #[tokio::test]
    async fn test_registry_rejects_unconfigured_provider() {
        let providers = HttpOAuthProviders::new()
            .with_client(HttpOAuthClient::github("id", "secret", Client::new()));

        assert!(providers.supports(OAuthProvider::GitHub));
        assert!(!providers.supports(OAuthProvider::Microsoft));

        let result = providers
            .exchange_code(OAuthProvider::Microsoft, "code", "http://localhost/cb")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidOAuthProvider)));
    }

    #[tokio::test]
    async fn test_missing_client_secret_is_a_configuration_gap() {
        let oidc = OidcConfig::new("http://127.0.0.1:1", "portal");
        let client = HttpOAuthClient::authentik(&oidc, Client::new());

        let result = client
            .exchange_code(OAuthProvider::Authentik, "code", "http://localhost/cb")
            .await;

        assert!(matches!(result, Err(AuthError::ConfigurationGap(_))));
    }

    #[test]
    fn test_from_config_only_enables_listed_providers() {
        use crate::config::{AuthStrategy, SocialProviderConfig};

        let config = AuthConfig::development()
            .with_strategy(AuthStrategy::default().with_social_providers(vec![OAuthProvider::Google]))
            .with_social_provider(SocialProviderConfig::new(OAuthProvider::Google, "g", "gs"))
            .with_social_provider(SocialProviderConfig::new(OAuthProvider::GitHub, "h", "hs"));

        let providers = HttpOAuthProviders::from_config(&config, &Client::new());

        assert!(providers.supports(OAuthProvider::Google));
        assert!(!providers.supports(OAuthProvider::GitHub));
        assert!(!providers.supports(OAuthProvider::Authentik));
    }
}
