//! Sign-in actions.
//!
//! Actions are either **commands** (a browser request starting or continuing
//! an attempt) or **events** (the result of an effect the executor ran).

use crate::error::AuthError;
use crate::session::SessionToken;
use crate::state::{Credential, OAuthProvider, VerifiedIdentity};
use chrono::{DateTime, Utc};

/// Query parameters a provider sends back to the SSO callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoCallbackParams {
    /// Authorization code.
    pub code: Option<String>,

    /// Echoed state parameter.
    pub state: Option<String>,

    /// Provider-reported error (e.g. `access_denied`).
    pub error: Option<String>,
}

/// Sign-in action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInAction {
    // ═══════════════════════════════════════════════════════════════════════
    // Credentials
    // ═══════════════════════════════════════════════════════════════════════

    /// Email/password form submitted.
    SubmitCredentials {
        /// Submitted credential.
        credential: Credential,
        /// Requested destination (untrusted).
        callback_url: Option<String>,
    },

    /// Credential verification finished.
    CredentialsVerified {
        /// Identity, or `None` when no backend vouched for the credential.
        identity: Option<Box<VerifiedIdentity>>,
    },

    /// Credential verification could not start (validation).
    CredentialsInvalid {
        /// Reason.
        error: AuthError,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // SSO
    // ═══════════════════════════════════════════════════════════════════════

    /// Browser asked to sign in through a provider.
    InitiateSso {
        /// Provider.
        provider: OAuthProvider,
        /// Requested destination (untrusted).
        callback_url: Option<String>,
        /// Freshly generated CSRF state.
        state: String,
        /// Current time.
        now: DateTime<Utc>,
    },

    /// Provider authorization URL built.
    AuthorizationUrlReady {
        /// URL to send the browser to.
        url: String,
    },

    /// Provider redirected back to the callback.
    SsoCallback {
        /// Callback query parameters.
        params: SsoCallbackParams,
        /// Current time.
        now: DateTime<Utc>,
    },

    /// Code exchange and bridging finished.
    SsoIdentityResolved {
        /// Identity, or `None` when bridging produced none.
        identity: Option<Box<VerifiedIdentity>>,
    },

    /// An SSO step failed.
    SsoFailed {
        /// Reason.
        error: AuthError,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Session
    // ═══════════════════════════════════════════════════════════════════════

    /// Session token signed.
    SessionComposed {
        /// The session.
        session: Box<SessionToken>,
    },

    /// No session could be composed.
    SessionRejected {
        /// Reason.
        error: AuthError,
    },

    /// Browser redirect issued.
    Redirected,

    /// Clear a finished attempt.
    Reset,
}
