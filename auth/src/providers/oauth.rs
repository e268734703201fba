//! OAuth2/OIDC provider trait.

use super::IdentityClaims;
use crate::error::Result;
use crate::state::{OAuthProvider, ProviderTokens};

/// OAuth2/OIDC provider.
///
/// This trait abstracts over the browser-redirect providers (first-party SSO,
/// Google, GitHub, Microsoft). One implementation may serve several
/// providers and returns [`crate::AuthError::InvalidOAuthProvider`] for the
/// ones it does not handle.
pub trait OAuth2Provider: Send + Sync {
    /// Build authorization URL.
    ///
    /// # Returns
    ///
    /// The URL to redirect the user to for authorization.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is not configured or URL construction
    /// fails.
    fn build_authorization_url(
        &self,
        provider: OAuthProvider,
        state: &str,
        redirect_uri: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Exchange authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Provider rejects the code
    /// - Response is malformed
    fn exchange_code(
        &self,
        provider: OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> impl std::future::Future<Output = Result<OAuthTokenResponse>> + Send;

    /// Fetch the user's claims from the provider.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Token is invalid
    /// - Response is malformed
    fn fetch_user_info(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> impl std::future::Future<Output = Result<IdentityClaims>> + Send;
}

/// OAuth token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenResponse {
    /// Access token.
    pub access_token: String,

    /// Refresh token (if available).
    pub refresh_token: Option<String>,

    /// Expiration timestamp (if provided).
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<OAuthTokenResponse> for ProviderTokens {
    fn from(response: OAuthTokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        }
    }
}
