//! Mock OAuth2 provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::{IdentityClaims, OAuth2Provider, OAuthTokenResponse};
use crate::state::OAuthProvider;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock `OAuth2` provider.
///
/// Serves every provider. Claims default to a verified
/// `test@example.com` profile and can be overridden per provider.
#[derive(Debug, Clone)]
pub struct MockOAuth2Provider {
    /// Whether to simulate success or failure.
    pub should_succeed: bool,
    claims: Arc<Mutex<HashMap<OAuthProvider, IdentityClaims>>>,
    exchanges: Arc<AtomicUsize>,
}

impl MockOAuth2Provider {
    /// Create a new mock `OAuth2` provider that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            should_succeed: true,
            claims: Arc::new(Mutex::new(HashMap::new())),
            exchanges: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that will fail requests.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_succeed: false,
            ..Self::new()
        }
    }

    /// Report `claims` for `provider`.
    #[must_use]
    pub fn with_claims(self, provider: OAuthProvider, claims: IdentityClaims) -> Self {
        if let Ok(mut map) = self.claims.lock() {
            map.insert(provider, claims);
        }
        self
    }

    /// Number of code exchanges performed (shared between clones).
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn default_claims() -> IdentityClaims {
        IdentityClaims {
            sub: "oauth_user_123".to_string(),
            email: Some("test@example.com".to_string()),
            email_verified: Some(true),
            name: Some("Test User".to_string()),
            picture: Some("https://example.com/avatar.jpg".to_string()),
            ..IdentityClaims::default()
        }
    }
}

impl Default for MockOAuth2Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuth2Provider for MockOAuth2Provider {
    async fn build_authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        if !self.should_succeed {
            return Err(AuthError::UpstreamUnavailable("mock provider".to_string()));
        }

        Ok(format!(
            "https://{}.example.com/oauth/authorize?state={state}&redirect_uri={}",
            provider.as_str(),
            urlencoding::encode(redirect_uri)
        ))
    }

    async fn exchange_code(
        &self,
        _provider: OAuthProvider,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<OAuthTokenResponse> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if !self.should_succeed || code.is_empty() {
            return Err(AuthError::OAuthCodeInvalid);
        }

        Ok(OAuthTokenResponse {
            access_token: "mock_access_token_123".to_string(),
            refresh_token: Some("mock_refresh_token_456".to_string()),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        })
    }

    async fn fetch_user_info(&self, provider: OAuthProvider, _access_token: &str) -> Result<IdentityClaims> {
        if !self.should_succeed {
            return Err(AuthError::UpstreamRejected { status: 401 });
        }

        let claims = self
            .claims
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".to_string()))?
            .get(&provider)
            .cloned();
        Ok(claims.unwrap_or_else(Self::default_claims))
    }
}
