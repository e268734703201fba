//! Mock provider implementations for testing.
//!
//! In-memory implementations of every provider trait, for unit and
//! integration tests. Clones share their call counters, so a test can hand a
//! clone to the component under test and inspect the original afterwards.

pub mod credentials;
pub mod oauth;
pub mod social;

pub use credentials::MockCredentialBackend;
pub use oauth::MockOAuth2Provider;
pub use social::MockSocialRegistry;

use crate::state::{
    IdentitySource, ProviderTokens, Role, SessionCompleteness, TenantId, UserId, UserIdentity,
    VerifiedIdentity,
};

/// A complete identity for `ada@acme.test`, attributed to `source`.
#[must_use]
pub fn sample_identity(source: IdentitySource) -> VerifiedIdentity {
    VerifiedIdentity {
        identity: UserIdentity {
            id: UserId("user-42".to_string()),
            email: "ada@acme.test".to_string(),
            name: Some("Ada Lovelace".to_string()),
            role: Role::User,
            tenant_id: Some(TenantId("tenant-1".to_string())),
            brand: Some("acme".to_string()),
            image: None,
        },
        tokens: ProviderTokens {
            access_token: "mock_access_token".to_string(),
            refresh_token: Some("mock_refresh_token".to_string()),
            expires_at: None,
        },
        source,
        completeness: SessionCompleteness::Complete,
    }
}
