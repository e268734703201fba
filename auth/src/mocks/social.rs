//! Mock social-login registry for testing.

use crate::error::{AuthError, Result};
use crate::providers::{IdentityClaims, SocialRegistry};
use crate::state::{
    IdentitySource, OAuthProvider, ProviderTokens, Role, SessionCompleteness, TenantId, UserId,
    UserIdentity, VerifiedIdentity,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock social-login registry.
///
/// Uses in-memory storage keyed by `(email, provider)`.
#[derive(Debug, Clone)]
pub struct MockSocialRegistry {
    /// Whether to simulate success or failure.
    pub should_succeed: bool,
    accounts: Arc<Mutex<HashMap<(String, OAuthProvider), UserId>>>,
    calls: Arc<AtomicUsize>,
}

impl MockSocialRegistry {
    /// Create a new mock registry that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            should_succeed: true,
            accounts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
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

    /// Number of registration requests (shared between clones).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of accounts created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.accounts.lock().map(|accounts| accounts.len()).unwrap_or_default()
    }
}

impl Default for MockSocialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialRegistry for MockSocialRegistry {
    async fn register(&self, provider: OAuthProvider, claims: &IdentityClaims) -> Result<VerifiedIdentity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.should_succeed {
            return Err(AuthError::UpstreamRejected { status: 502 });
        }

        let email = claims.usable_email().ok_or(AuthError::AuthenticationFailed)?.to_string();
        let id = {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Internal("mock lock poisoned".to_string()))?;
            let next = accounts.len() + 1;
            accounts
                .entry((email.clone(), provider))
                .or_insert_with(|| UserId(format!("social-{next}")))
                .clone()
        };

        Ok(VerifiedIdentity {
            identity: UserIdentity {
                id,
                email,
                name: claims.display_name(),
                role: Role::User,
                tenant_id: Some(TenantId("tenant-social".to_string())),
                brand: None,
                image: claims.picture.clone(),
            },
            tokens: ProviderTokens {
                access_token: "gateway_access_token".to_string(),
                refresh_token: None,
                expires_at: None,
            },
            source: IdentitySource::Social(provider),
            completeness: SessionCompleteness::Complete,
        })
    }
}
