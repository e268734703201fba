//! Credential Verifier.
//!
//! Checks an email/password pair against the primary identity system and,
//! when the primary gives no conclusive answer, against the fallback.
//!
//! ```text
//! validate ──▶ primary ──Verified──▶ identity
//!                 │  └──Rejected──▶ no identity
//!                 └──Inconclusive──▶ fallback? ──Verified──▶ identity
//!                                        └─────otherwise──▶ no identity
//! ```
//!
//! Calls are sequential, each bounded by the upstream timeout, and never
//! retried.

use crate::error::{AuthError, Result};
use crate::providers::{CredentialBackend, CredentialOutcome};
use crate::state::{Credential, VerifiedIdentity};
use std::time::Duration;

/// Verifies credentials against a primary backend with an optional fallback.
#[derive(Debug, Clone)]
pub struct CredentialVerifier<P, F> {
    primary: P,
    fallback: Option<F>,
    timeout: Duration,
}

impl<P, F> CredentialVerifier<P, F>
where
    P: CredentialBackend,
    F: CredentialBackend,
{
    /// Create a verifier.
    #[must_use]
    pub const fn new(primary: P, fallback: Option<F>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    /// Verify a credential.
    ///
    /// Returns `Ok(None)` ("no identity") when the backends reject the
    /// credential or cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] when the email or password is
    /// empty. No backend is called in that case.
    pub async fn verify(&self, credential: &Credential) -> Result<Option<VerifiedIdentity>> {
        credential.validate()?;

        match self.consult(&self.primary, credential).await {
            CredentialOutcome::Verified(identity) => {
                tracing::debug!(backend = self.primary.name(), "Credential verified by primary backend");
                return Ok(Some(*identity));
            }
            CredentialOutcome::Rejected => {
                tracing::debug!(backend = self.primary.name(), "Credential rejected by primary backend");
                return Ok(None);
            }
            CredentialOutcome::Inconclusive(reason) => {
                tracing::warn!(
                    backend = self.primary.name(),
                    reason = %reason,
                    "Primary backend inconclusive"
                );
            }
        }

        let Some(fallback) = &self.fallback else {
            return Ok(None);
        };

        match self.consult(fallback, credential).await {
            CredentialOutcome::Verified(identity) => {
                tracing::debug!(backend = fallback.name(), "Credential verified by fallback backend");
                Ok(Some(*identity))
            }
            CredentialOutcome::Rejected => Ok(None),
            CredentialOutcome::Inconclusive(reason) => {
                tracing::warn!(
                    backend = fallback.name(),
                    reason = %reason,
                    "Fallback backend inconclusive"
                );
                Ok(None)
            }
        }
    }

    async fn consult<B: CredentialBackend>(&self, backend: &B, credential: &Credential) -> CredentialOutcome {
        tokio::time::timeout(self.timeout, backend.verify(credential))
            .await
            .unwrap_or_else(|_| {
                CredentialOutcome::Inconclusive(AuthError::UpstreamUnavailable(format!(
                    "{} timed out after {:?}",
                    backend.name(),
                    self.timeout
                )))
            })
    }
}
