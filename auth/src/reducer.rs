//! Sign-in reducer.
//!
//! Pure transition logic for one sign-in attempt.
//!
//! # Flow
//!
//! ```text
//! anonymous ─SubmitCredentials─▶ credentials_submitted ─┐
//!     │                                                 ├─▶ identity_resolved
//!     └─InitiateSso─▶ sso_initiated ─SsoCallback────────┘         │
//!                                                     ComposeSession
//!                                                                 ▼
//!                                  redirected ◀─Redirect─ session_established
//! ```
//!
//! Failures end in `credentials_rejected` or `sso_failed`; both are terminal
//! for the attempt and are never retried here.

use crate::actions::{SignInAction, SsoCallbackParams};
use crate::config::RedirectConfig;
use crate::constants::SSO_STATE_TTL_SECS;
use crate::effects::SignInEffect;
use crate::error::AuthError;
use crate::redirect::RedirectResolver;
use crate::state::{OAuthProvider, PendingSso, SignInMethod, SignInPhase, SignInState};
use crate::utils::tokens_match;
use chrono::{DateTime, Duration, Utc};
use smallvec::{smallvec, SmallVec};

/// Effects produced by one reduction.
pub type Effects = SmallVec<[SignInEffect; 2]>;

/// Sign-in reducer.
#[derive(Debug, Clone)]
pub struct SignInReducer {
    redirect: RedirectConfig,
    resolver: RedirectResolver,
    enabled_providers: Vec<OAuthProvider>,
    sso_state_ttl: Duration,
}

impl SignInReducer {
    /// Create a reducer.
    #[must_use]
    pub fn new(redirect: RedirectConfig, enabled_providers: Vec<OAuthProvider>) -> Self {
        Self {
            resolver: RedirectResolver::new(&redirect),
            redirect,
            enabled_providers,
            sso_state_ttl: Duration::seconds(SSO_STATE_TTL_SECS),
        }
    }

    /// Set the pending-SSO lifetime.
    ///
    /// Default: 5 minutes
    #[must_use]
    pub const fn with_sso_state_ttl(mut self, ttl: Duration) -> Self {
        self.sso_state_ttl = ttl;
        self
    }

    /// Redirect resolver in use.
    #[must_use]
    pub const fn resolver(&self) -> &RedirectResolver {
        &self.resolver
    }

    /// Providers accepted by [`SignInAction::InitiateSso`].
    #[must_use]
    pub fn enabled_providers(&self) -> &[OAuthProvider] {
        &self.enabled_providers
    }

    /// Apply an action to the state.
    #[allow(clippy::too_many_lines)] // One arm per transition
    pub fn reduce(&self, state: &mut SignInState, action: SignInAction) -> Effects {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Credentials
            // ═══════════════════════════════════════════════════════════════
            SignInAction::SubmitCredentials {
                credential,
                callback_url,
            } => {
                if state.phase != SignInPhase::Anonymous {
                    return ignore(state, "SubmitCredentials");
                }
                state.method = Some(SignInMethod::Credentials);
                state.callback_url = callback_url;

                if let Err(error) = credential.validate() {
                    fail(state, error);
                    return SmallVec::new();
                }

                state.phase = SignInPhase::CredentialsSubmitted;
                smallvec![SignInEffect::VerifyCredentials { credential }]
            }

            SignInAction::CredentialsVerified { identity } => {
                if state.phase != SignInPhase::CredentialsSubmitted {
                    return ignore(state, "CredentialsVerified");
                }
                match identity {
                    Some(identity) => {
                        state.phase = SignInPhase::IdentityResolved;
                        state.identity = Some((*identity).clone());
                        smallvec![SignInEffect::ComposeSession { identity }]
                    }
                    None => {
                        fail(state, AuthError::AuthenticationFailed);
                        SmallVec::new()
                    }
                }
            }

            SignInAction::CredentialsInvalid { error } => {
                if state.phase != SignInPhase::CredentialsSubmitted {
                    return ignore(state, "CredentialsInvalid");
                }
                fail(state, error);
                SmallVec::new()
            }

            // ═══════════════════════════════════════════════════════════════
            // SSO
            // ═══════════════════════════════════════════════════════════════
            SignInAction::InitiateSso {
                provider,
                callback_url,
                state: csrf_state,
                now,
            } => {
                if state.phase != SignInPhase::Anonymous {
                    return ignore(state, "InitiateSso");
                }
                state.method = Some(SignInMethod::Sso(provider));
                state.callback_url = callback_url.clone();

                if !self.enabled_providers.contains(&provider) {
                    fail(state, AuthError::InvalidOAuthProvider);
                    return SmallVec::new();
                }

                state.phase = SignInPhase::SsoInitiated;
                state.pending_sso = Some(PendingSso {
                    state: csrf_state.clone(),
                    provider,
                    callback_url,
                    initiated_at: now,
                });
                smallvec![SignInEffect::BuildAuthorizationUrl {
                    provider,
                    state: csrf_state,
                    redirect_uri: self.redirect.oauth_callback_uri(provider),
                }]
            }

            SignInAction::AuthorizationUrlReady { url } => {
                if state.phase != SignInPhase::SsoInitiated {
                    return ignore(state, "AuthorizationUrlReady");
                }
                state.authorization_url = Some(url);
                SmallVec::new()
            }

            SignInAction::SsoCallback { params, now } => {
                if state.phase != SignInPhase::SsoInitiated {
                    return ignore(state, "SsoCallback");
                }
                // One-time use.
                let Some(pending) = state.pending_sso.take() else {
                    fail(state, AuthError::OAuthStateInvalid);
                    return SmallVec::new();
                };
                match self.check_callback(&pending, &params, now) {
                    Ok(code) => smallvec![SignInEffect::ResolveSsoIdentity {
                        provider: pending.provider,
                        code,
                        redirect_uri: self.redirect.oauth_callback_uri(pending.provider),
                    }],
                    Err(error) => {
                        fail(state, error);
                        SmallVec::new()
                    }
                }
            }

            SignInAction::SsoIdentityResolved { identity } => {
                if state.phase != SignInPhase::SsoInitiated {
                    return ignore(state, "SsoIdentityResolved");
                }
                match identity {
                    Some(identity) => {
                        state.phase = SignInPhase::IdentityResolved;
                        state.identity = Some((*identity).clone());
                        smallvec![SignInEffect::ComposeSession { identity }]
                    }
                    None => {
                        fail(state, AuthError::AuthenticationFailed);
                        SmallVec::new()
                    }
                }
            }

            SignInAction::SsoFailed { error } => {
                if state.phase != SignInPhase::SsoInitiated {
                    return ignore(state, "SsoFailed");
                }
                fail(state, error);
                SmallVec::new()
            }

            // ═══════════════════════════════════════════════════════════════
            // Session
            // ═══════════════════════════════════════════════════════════════
            SignInAction::SessionComposed { session } => {
                if state.phase != SignInPhase::IdentityResolved {
                    return ignore(state, "SessionComposed");
                }
                let to = self
                    .resolver
                    .resolve(state.callback_url.as_deref(), Some(session.claims.role));
                state.phase = SignInPhase::SessionEstablished;
                state.session = Some(*session);
                state.redirect_to = Some(to.clone());
                smallvec![SignInEffect::Redirect { to }]
            }

            SignInAction::SessionRejected { error } => {
                if state.phase != SignInPhase::IdentityResolved {
                    return ignore(state, "SessionRejected");
                }
                state.identity = None;
                fail(state, error);
                SmallVec::new()
            }

            SignInAction::Redirected => {
                if state.phase != SignInPhase::SessionEstablished {
                    return ignore(state, "Redirected");
                }
                state.phase = SignInPhase::Redirected;
                SmallVec::new()
            }

            SignInAction::Reset => {
                *state = SignInState::default();
                SmallVec::new()
            }
        }
    }

    fn check_callback(
        &self,
        pending: &PendingSso,
        params: &SsoCallbackParams,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        if let Some(error) = &params.error {
            tracing::warn!(provider = pending.provider.as_str(), error = %error, "Provider reported an error");
            return Err(AuthError::AuthenticationFailed);
        }

        let returned_state = params.state.as_deref().unwrap_or_default();
        if !tokens_match(&pending.state, returned_state) {
            tracing::warn!(provider = pending.provider.as_str(), "OAuth state mismatch");
            return Err(AuthError::OAuthStateInvalid);
        }

        if now.signed_duration_since(pending.initiated_at) > self.sso_state_ttl {
            tracing::warn!(provider = pending.provider.as_str(), "OAuth state expired");
            return Err(AuthError::OAuthStateInvalid);
        }

        params
            .code
            .clone()
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::OAuthCodeInvalid)
    }
}

/// Move the attempt into its terminal failure phase.
fn fail(state: &mut SignInState, error: AuthError) {
    state.phase = match state.method {
        Some(SignInMethod::Sso(_)) => SignInPhase::SsoFailed,
        _ => SignInPhase::CredentialsRejected,
    };
    state.pending_sso = None;
    state.error = Some(error);
}

fn ignore(state: &SignInState, action: &'static str) -> Effects {
    tracing::debug!(phase = ?state.phase, action, "Ignoring action in current phase");
    SmallVec::new()
}
