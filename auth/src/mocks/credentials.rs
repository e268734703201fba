//! Mock credential backend for testing.

use super::sample_identity;
use crate::error::AuthError;
use crate::providers::{CredentialBackend, CredentialOutcome};
use crate::state::{Credential, IdentitySource, VerifiedIdentity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    Verify(Box<VerifiedIdentity>),
    Reject,
    Unavailable,
    Unconfigured,
}

/// Mock credential backend.
///
/// Answers every check the same way, optionally after a delay.
#[derive(Debug, Clone)]
pub struct MockCredentialBackend {
    behavior: Behavior,
    password: Option<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockCredentialBackend {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            password: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Backend that vouches for every credential with the sample identity.
    #[must_use]
    pub fn verifying(source: IdentitySource) -> Self {
        Self::verifying_identity(sample_identity(source))
    }

    /// Backend that vouches for every credential with `identity`.
    #[must_use]
    pub fn verifying_identity(identity: VerifiedIdentity) -> Self {
        Self::with_behavior(Behavior::Verify(Box::new(identity)))
    }

    /// Backend that refuses every credential.
    #[must_use]
    pub fn rejecting() -> Self {
        Self::with_behavior(Behavior::Reject)
    }

    /// Backend that cannot be reached.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::with_behavior(Behavior::Unavailable)
    }

    /// Backend that is missing its configuration.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::with_behavior(Behavior::Unconfigured)
    }

    /// Only vouch when the password matches; reject otherwise.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Answer after `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of checks performed (shared between clones).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialBackend for MockCredentialBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn verify(&self, credential: &Credential) -> CredentialOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            Behavior::Verify(identity) => match &self.password {
                Some(expected) if expected != &credential.password => CredentialOutcome::Rejected,
                _ => CredentialOutcome::Verified(identity.clone()),
            },
            Behavior::Reject => CredentialOutcome::Rejected,
            Behavior::Unavailable => CredentialOutcome::Inconclusive(AuthError::UpstreamUnavailable(
                "connection refused".to_string(),
            )),
            Behavior::Unconfigured => {
                CredentialOutcome::Inconclusive(AuthError::ConfigurationGap("mock backend".to_string()))
            }
        }
    }
}
