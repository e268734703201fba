//! Sign-in effects.
//!
//! Effects are **values**, not execution. The reducer returns them and
//! [`crate::flow::SignInFlow`] interprets them, performing the upstream I/O
//! and feeding the result back as a [`crate::actions::SignInAction`].

use crate::state::{Credential, OAuthProvider, VerifiedIdentity};

/// Sign-in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInEffect {
    /// Run the Credential Verifier.
    VerifyCredentials {
        /// Credential to check.
        credential: Credential,
    },

    /// Build the provider authorization URL.
    BuildAuthorizationUrl {
        /// Provider.
        provider: OAuthProvider,
        /// CSRF state parameter.
        state: String,
        /// Callback URI registered with the provider.
        redirect_uri: String,
    },

    /// Exchange the authorization code, fetch claims and bridge them.
    ResolveSsoIdentity {
        /// Provider.
        provider: OAuthProvider,
        /// Authorization code.
        code: String,
        /// Callback URI used for the authorization request.
        redirect_uri: String,
    },

    /// Sign a session for the resolved identity.
    ComposeSession {
        /// Identity to embed.
        identity: Box<VerifiedIdentity>,
    },

    /// Send the browser to its destination.
    Redirect {
        /// Absolute destination URL.
        to: String,
    },
}
