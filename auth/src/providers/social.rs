//! Social-login registry trait.

use super::IdentityClaims;
use crate::error::Result;
use crate::state::{OAuthProvider, VerifiedIdentity};
use std::future::Future;

/// Registry that turns a social provider profile into an internal account.
///
/// The registry creates the account on the first sign-in for an
/// `(email, provider)` pair and returns the same account afterwards.
pub trait SocialRegistry: Send + Sync {
    /// Register or look up the account for a verified social profile.
    ///
    /// The caller guarantees `claims.usable_email()` is `Some`.
    ///
    /// # Errors
    ///
    /// Returns error if the registry is unreachable, not configured, answers
    /// with a non-success status, or returns a malformed body.
    fn register(
        &self,
        provider: OAuthProvider,
        claims: &IdentityClaims,
    ) -> impl Future<Output = Result<VerifiedIdentity>> + Send;
}
