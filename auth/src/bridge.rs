//! Social/OIDC Bridge.
//!
//! Turns a provider's claims into an internal identity. Claims from the
//! first-party IdP are authoritative and map directly; social provider claims
//! go through the [`SocialRegistry`], which creates the account on first
//! sign-in and reuses it afterwards.

use crate::config::SocialFailurePolicy;
use crate::error::AuthError;
use crate::providers::{IdentityClaims, SocialRegistry};
use crate::roles::RoleMapper;
use crate::state::{
    IdentitySource, OAuthProvider, ProviderTokens, Role, SessionCompleteness, TenantId, UserId,
    UserIdentity, VerifiedIdentity,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Bridges provider claims to internal identities.
#[derive(Clone)]
pub struct SocialBridge<R> {
    registry: R,
    role_mapper: Arc<dyn RoleMapper>,
    failure_policy: SocialFailurePolicy,
    timeout: Duration,
}

impl<R: SocialRegistry> SocialBridge<R> {
    /// Create a bridge.
    #[must_use]
    pub fn new(registry: R, role_mapper: Arc<dyn RoleMapper>, timeout: Duration) -> Self {
        Self {
            registry,
            role_mapper,
            failure_policy: SocialFailurePolicy::Reject,
            timeout,
        }
    }

    /// Set the registry failure policy.
    ///
    /// Default: [`SocialFailurePolicy::Reject`]
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: SocialFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Bridge claims from `provider` into an identity.
    ///
    /// Returns `None` ("no identity") when the claims carry no usable email,
    /// or when registration fails under the reject policy.
    pub async fn bridge(
        &self,
        provider: OAuthProvider,
        claims: &IdentityClaims,
        tokens: ProviderTokens,
    ) -> Option<VerifiedIdentity> {
        let Some(email) = claims.usable_email() else {
            tracing::warn!(provider = provider.as_str(), "Provider claims carry no usable email");
            return None;
        };

        if provider.is_first_party() {
            return Some(VerifiedIdentity {
                identity: UserIdentity {
                    id: UserId(claims.sub.clone()),
                    email: email.to_string(),
                    name: Some(claims.display_name().unwrap_or_else(|| email.to_string())),
                    role: self.role_mapper.map_role(claims),
                    tenant_id: claims.tenant_id.clone().map(TenantId),
                    brand: claims.brand.clone(),
                    image: claims.picture.clone(),
                },
                tokens,
                source: IdentitySource::Sso(provider),
                completeness: SessionCompleteness::Complete,
            });
        }

        let registered = tokio::time::timeout(self.timeout, self.registry.register(provider, claims))
            .await
            .unwrap_or_else(|_| Err(AuthError::UpstreamUnavailable("social login registration timed out".to_string())));

        match registered {
            Ok(identity) => Some(identity),
            Err(error) => match self.failure_policy {
                SocialFailurePolicy::Reject => {
                    tracing::error!(provider = provider.as_str(), error = %error, "Social login bridging failed");
                    None
                }
                SocialFailurePolicy::Degrade => {
                    tracing::warn!(
                        provider = provider.as_str(),
                        error = %error,
                        "Social login bridging failed, continuing with a degraded session"
                    );
                    Some(degraded_identity(provider, claims, email, tokens))
                }
            },
        }
    }
}

fn degraded_identity(
    provider: OAuthProvider,
    claims: &IdentityClaims,
    email: &str,
    tokens: ProviderTokens,
) -> VerifiedIdentity {
    VerifiedIdentity {
        identity: UserIdentity {
            id: UserId(format!("{}:{}", provider.as_str(), claims.sub)),
            email: email.to_string(),
            name: Some(claims.display_name().unwrap_or_else(|| email.to_string())),
            role: Role::default(),
            tenant_id: None,
            brand: None,
            image: claims.picture.clone(),
        },
        tokens,
        source: IdentitySource::Social(provider),
        completeness: SessionCompleteness::Degraded,
    }
}

impl<R> fmt::Debug for SocialBridge<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocialBridge")
            .field("failure_policy", &self.failure_policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
