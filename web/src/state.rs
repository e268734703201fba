//! Application state for Axum handlers.

use crate::cookies::CookieSettings;
use portal_auth::providers::{
    CredentialBackend, GatewaySocialRegistry, HttpCredentialBackend, HttpOAuthProviders,
    LegacyAuthBackend, OAuth2Provider, SocialRegistry,
};
use portal_auth::SignInFlow;
use std::fmt;
use std::sync::Arc;

/// State shared by every sign-in route.
///
/// Generic over the flow's upstream clients so the routes can be exercised
/// against in-memory mocks.
pub struct AppState<P, F, O, R> {
    /// Sign-in flow executor.
    pub flow: Arc<SignInFlow<P, F, O, R>>,

    /// Cookie attributes.
    pub cookies: CookieSettings,
}

/// State wired to the HTTP upstream clients.
pub type HttpAppState =
    AppState<HttpCredentialBackend, LegacyAuthBackend, HttpOAuthProviders, GatewaySocialRegistry>;

impl<P, F, O, R> AppState<P, F, O, R>
where
    P: CredentialBackend,
    F: CredentialBackend,
    O: OAuth2Provider,
    R: SocialRegistry,
{
    /// Create state around a flow. Cookies are `Secure` when the flow's
    /// origin is https.
    #[must_use]
    pub fn new(flow: SignInFlow<P, F, O, R>) -> Self {
        let cookies = CookieSettings::new(flow.resolver().origin().starts_with("https://"));
        Self {
            flow: Arc::new(flow),
            cookies,
        }
    }
}

// Manual impl: the upstream client types need not be `Clone`.
impl<P, F, O, R> Clone for AppState<P, F, O, R> {
    fn clone(&self) -> Self {
        Self {
            flow: Arc::clone(&self.flow),
            cookies: self.cookies,
        }
    }
}

impl<P, F, O, R> fmt::Debug for AppState<P, F, O, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("cookies", &self.cookies)
            .finish_non_exhaustive()
    }
}
