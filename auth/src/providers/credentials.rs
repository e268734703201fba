//! Email/password backends.

use super::{LegacyAuthBackend, OidcPasswordBackend};
use crate::error::AuthError;
use crate::state::{Credential, VerifiedIdentity};
use std::future::Future;

/// Answer of one backend to a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// The backend vouched for the credential.
    Verified(Box<VerifiedIdentity>),

    /// The backend explicitly refused the credential. Conclusive.
    Rejected,

    /// The backend gave no usable answer (unreachable, misconfigured,
    /// unexpected status, interactive login required). The reason is for
    /// logs only.
    Inconclusive(AuthError),
}

impl CredentialOutcome {
    /// Returns `true` if another backend may still be consulted.
    #[must_use]
    pub const fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive(_))
    }
}

/// Identity system able to verify an email/password pair.
///
/// Implementations absorb transport and parsing failures into
/// [`CredentialOutcome::Inconclusive`]; they never fail outright.
pub trait CredentialBackend: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Check a credential.
    fn verify(&self, credential: &Credential) -> impl Future<Output = CredentialOutcome> + Send;
}

/// HTTP backend selected by configuration.
#[derive(Debug, Clone)]
pub enum HttpCredentialBackend {
    /// OIDC password grant.
    Oidc(OidcPasswordBackend),
    /// Legacy auth service.
    Legacy(LegacyAuthBackend),
    /// Backend selected by the strategy but missing its configuration.
    Unconfigured(&'static str),
}

impl CredentialBackend for HttpCredentialBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Oidc(backend) => backend.name(),
            Self::Legacy(backend) => backend.name(),
            Self::Unconfigured(name) => name,
        }
    }

    async fn verify(&self, credential: &Credential) -> CredentialOutcome {
        match self {
            Self::Oidc(backend) => backend.verify(credential).await,
            Self::Legacy(backend) => backend.verify(credential).await,
            Self::Unconfigured(name) => CredentialOutcome::Inconclusive(AuthError::ConfigurationGap(
                format!("{name} backend is not configured"),
            )),
        }
    }
}
