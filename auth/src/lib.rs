//! # Portal Authentication
//!
//! Sign-in for the multi-tenant portal frontends: turns an email/password
//! pair or an SSO round-trip into a signed session token and a safe
//! post-login destination.
//!
//! ## Components
//!
//! - **Credential Verifier** ([`verifier`]): primary identity system first,
//!   fallback only when the primary is inconclusive
//! - **Social/OIDC Bridge** ([`bridge`]): maps first-party claims directly,
//!   registers social profiles with the gateway
//! - **Session Token Composer** ([`session`]): signs the session on sign-in,
//!   re-signs it on refresh
//! - **Redirect Resolver** ([`redirect`]): same-origin destinations only
//!
//! ## Architecture
//!
//! Each attempt is a small state machine driven by a reducer:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! [`flow::SignInFlow`] executes the effects against the upstream
//! identity systems in [`providers`].
//!
//! ## Example: Credentials Sign-In
//!
//! ```rust,ignore
//! use portal_auth::{AuthConfig, Credential, HttpSignInFlow};
//!
//! let config = AuthConfig::from_env()?;
//! let flow = HttpSignInFlow::from_config(&config, &reqwest::Client::new());
//!
//! let state = flow
//!     .sign_in_with_credentials(Credential::new("ada@acme.test", "pw"), Some("/reports".into()))
//!     .await;
//!
//! if let Some(session) = state.session {
//!     // Set the session cookie and redirect to `state.redirect_to`.
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod actions;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod effects;
pub mod error;
pub mod flow;
pub mod providers;
pub mod redirect;
pub mod reducer;
pub mod roles;
pub mod session;
pub mod state;
pub mod utils;
pub mod verifier;

// Mock implementations for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::{SignInAction, SsoCallbackParams};
pub use bridge::SocialBridge;
pub use config::{AuthConfig, ConfigError};
pub use effects::SignInEffect;
pub use error::{AuthError, Result};
pub use flow::{HttpSignInFlow, SignInFlow};
pub use redirect::RedirectResolver;
pub use reducer::SignInReducer;
pub use session::{SessionClaims, SessionToken, SessionTokenComposer};
pub use state::{
    Credential, OAuthProvider, PendingSso, Role, SignInPhase, SignInState, UserId, VerifiedIdentity,
};
pub use verifier::CredentialVerifier;
