//! Sign-in flow executor.
//!
//! Drives one [`SignInState`] through the [`SignInReducer`], executing the
//! effects it returns and feeding results back as actions until no effect
//! remains. Every attempt starts from a fresh state; nothing is shared
//! between requests except configuration and pooled HTTP clients.

use crate::actions::{SignInAction, SsoCallbackParams};
use crate::bridge::SocialBridge;
use crate::config::{AuthConfig, PrimaryProvider};
use crate::effects::SignInEffect;
use crate::error::AuthError;
use crate::providers::{
    CredentialBackend, GatewaySocialRegistry, HttpCredentialBackend, HttpOAuthProviders,
    LegacyAuthBackend, OAuth2Provider, OidcPasswordBackend, SocialRegistry,
};
use crate::reducer::SignInReducer;
use crate::redirect::RedirectResolver;
use crate::roles::{GroupRoleMapper, RoleMapper};
use crate::session::SessionTokenComposer;
use crate::state::{
    Credential, OAuthProvider, PendingSso, SignInMethod, SignInPhase, SignInState, VerifiedIdentity,
};
use crate::utils::generate_token;
use crate::verifier::CredentialVerifier;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Sign-in flow wired to the HTTP upstream clients.
pub type HttpSignInFlow =
    SignInFlow<HttpCredentialBackend, LegacyAuthBackend, HttpOAuthProviders, GatewaySocialRegistry>;

/// Executes sign-in attempts.
#[derive(Debug, Clone)]
pub struct SignInFlow<P, F, O, R> {
    verifier: CredentialVerifier<P, F>,
    oauth: O,
    bridge: SocialBridge<R>,
    composer: SessionTokenComposer,
    reducer: SignInReducer,
    timeout: Duration,
}

impl<P, F, O, R> SignInFlow<P, F, O, R>
where
    P: CredentialBackend,
    F: CredentialBackend,
    O: OAuth2Provider,
    R: SocialRegistry,
{
    /// Assemble a flow from its components.
    #[must_use]
    pub const fn new(
        verifier: CredentialVerifier<P, F>,
        oauth: O,
        bridge: SocialBridge<R>,
        composer: SessionTokenComposer,
        reducer: SignInReducer,
        timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            oauth,
            bridge,
            composer,
            reducer,
            timeout,
        }
    }

    /// Session token composer.
    #[must_use]
    pub const fn composer(&self) -> &SessionTokenComposer {
        &self.composer
    }

    /// Redirect resolver.
    #[must_use]
    pub const fn resolver(&self) -> &RedirectResolver {
        self.reducer.resolver()
    }

    /// Providers offered for browser-redirect sign-in.
    #[must_use]
    pub fn sso_providers(&self) -> &[OAuthProvider] {
        self.reducer.enabled_providers()
    }

    /// Sign in with an email/password pair.
    ///
    /// The returned state is either `Redirected` (with a session and a
    /// destination) or `CredentialsRejected` (with an error).
    #[tracing::instrument(skip_all, name = "sign_in_credentials")]
    pub async fn sign_in_with_credentials(
        &self,
        credential: Credential,
        callback_url: Option<String>,
    ) -> SignInState {
        metrics::counter!("auth.sign_in.started", "method" => "credentials").increment(1);
        let mut state = SignInState::default();
        self.run(
            &mut state,
            SignInAction::SubmitCredentials {
                credential,
                callback_url,
            },
        )
        .await;
        record_outcome(&state);
        state
    }

    /// Start a browser-redirect sign-in.
    ///
    /// On success the state is `SsoInitiated` and carries the authorization
    /// URL and the pending-SSO record to persist until the callback.
    #[tracing::instrument(skip(self, callback_url), name = "begin_sso")]
    pub async fn begin_sso(&self, provider: OAuthProvider, callback_url: Option<String>) -> SignInState {
        metrics::counter!("auth.sign_in.started", "method" => provider.as_str()).increment(1);
        let mut state = SignInState::default();
        self.run(
            &mut state,
            SignInAction::InitiateSso {
                provider,
                callback_url,
                state: generate_token(),
                now: Utc::now(),
            },
        )
        .await;
        if state.phase.is_failure() {
            record_outcome(&state);
        }
        state
    }

    /// Complete a browser-redirect sign-in.
    ///
    /// `pending` is the record stored by [`SignInFlow::begin_sso`]; a missing
    /// record, or one issued for another provider, fails the attempt.
    #[tracing::instrument(skip(self, pending, params), name = "complete_sso")]
    pub async fn complete_sso(
        &self,
        provider: OAuthProvider,
        pending: Option<PendingSso>,
        params: SsoCallbackParams,
    ) -> SignInState {
        let mut state = match pending.filter(|p| p.provider == provider) {
            Some(pending) => SignInState::resume_sso(pending),
            None => SignInState {
                phase: SignInPhase::SsoInitiated,
                method: Some(SignInMethod::Sso(provider)),
                ..SignInState::default()
            },
        };
        self.run(&mut state, SignInAction::SsoCallback { params, now: Utc::now() })
            .await;
        record_outcome(&state);
        state
    }

    async fn run(&self, state: &mut SignInState, action: SignInAction) {
        let mut effects: VecDeque<SignInEffect> = self.reducer.reduce(state, action).into_iter().collect();
        while let Some(effect) = effects.pop_front() {
            let next = self.execute(effect).await;
            effects.extend(self.reducer.reduce(state, next));
        }
    }

    async fn execute(&self, effect: SignInEffect) -> SignInAction {
        match effect {
            SignInEffect::VerifyCredentials { credential } => match self.verifier.verify(&credential).await {
                Ok(identity) => SignInAction::CredentialsVerified {
                    identity: identity.map(Box::new),
                },
                Err(error) => SignInAction::CredentialsInvalid { error },
            },

            SignInEffect::BuildAuthorizationUrl {
                provider,
                state,
                redirect_uri,
            } => match self
                .oauth
                .build_authorization_url(provider, &state, &redirect_uri)
                .await
            {
                Ok(url) => SignInAction::AuthorizationUrlReady { url },
                Err(error) => SignInAction::SsoFailed { error },
            },

            SignInEffect::ResolveSsoIdentity {
                provider,
                code,
                redirect_uri,
            } => match self.resolve_sso_identity(provider, &code, &redirect_uri).await {
                Ok(identity) => SignInAction::SsoIdentityResolved {
                    identity: identity.map(Box::new),
                },
                Err(error) => {
                    tracing::warn!(provider = provider.as_str(), error = %error, "SSO identity resolution failed");
                    SignInAction::SsoFailed { error }
                }
            },

            SignInEffect::ComposeSession { identity } => match self.composer.compose(Some(identity.as_ref())) {
                Ok(session) => SignInAction::SessionComposed {
                    session: Box::new(session),
                },
                Err(error) => SignInAction::SessionRejected { error },
            },

            // The HTTP layer performs the actual browser redirect.
            SignInEffect::Redirect { .. } => SignInAction::Redirected,
        }
    }

    async fn resolve_sso_identity(
        &self,
        provider: OAuthProvider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Option<VerifiedIdentity>, AuthError> {
        let tokens = self
            .bounded(self.oauth.exchange_code(provider, code, redirect_uri))
            .await?;
        let claims = self
            .bounded(self.oauth.fetch_user_info(provider, &tokens.access_token))
            .await?;
        Ok(self.bridge.bridge(provider, &claims, tokens.into()).await)
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| AuthError::UpstreamUnavailable(format!("timed out after {:?}", self.timeout)))?
    }
}

impl HttpSignInFlow {
    /// Wire a flow to the HTTP upstream clients described by `config`.
    #[must_use]
    pub fn from_config(config: &AuthConfig, http_client: &reqwest::Client) -> Self {
        let role_mapper: Arc<dyn RoleMapper> = Arc::new(
            config
                .oidc
                .as_ref()
                .map_or_else(GroupRoleMapper::default, |oidc| GroupRoleMapper::new(oidc.admin_group.clone())),
        );

        let legacy = LegacyAuthBackend::new(config.legacy.clone(), http_client.clone());
        let primary = match config.strategy.primary {
            PrimaryProvider::Oidc => match &config.oidc {
                Some(oidc) => HttpCredentialBackend::Oidc(
                    OidcPasswordBackend::new(oidc.clone(), http_client.clone())
                        .with_role_mapper(Arc::clone(&role_mapper)),
                ),
                None => HttpCredentialBackend::Unconfigured("oidc"),
            },
            PrimaryProvider::Legacy => HttpCredentialBackend::Legacy(legacy.clone()),
        };
        let fallback = config.strategy.uses_legacy_fallback().then_some(legacy);

        let verifier = CredentialVerifier::new(primary, fallback, config.upstream_timeout);
        let oauth = HttpOAuthProviders::from_config(config, http_client);
        let registry = GatewaySocialRegistry::new(config.social_bridge.clone(), http_client.clone());
        let bridge = SocialBridge::new(registry, role_mapper, config.upstream_timeout)
            .with_failure_policy(config.strategy.social_failure_policy);
        let composer = SessionTokenComposer::new(&config.session);
        let reducer = SignInReducer::new(config.redirect.clone(), config.enabled_sso_providers())
            .with_sso_state_ttl(composer.sso_state_ttl());

        Self::new(verifier, oauth, bridge, composer, reducer, config.upstream_timeout)
    }
}

fn record_outcome(state: &SignInState) {
    let method = match state.method {
        Some(SignInMethod::Sso(provider)) => provider.as_str(),
        _ => "credentials",
    };

    match (&state.phase, &state.error, &state.session) {
        (SignInPhase::Redirected, _, Some(session)) => {
            metrics::counter!("auth.sign_in.completed", "method" => method).increment(1);
            tracing::info!(
                method,
                user_id = %session.claims.sub,
                provider = %session.claims.provider,
                degraded = session.claims.degraded,
                "Sign-in completed"
            );
        }
        (_, Some(error), _) => {
            metrics::counter!("auth.sign_in.failed", "method" => method).increment(1);
            if error.is_security_issue() {
                tracing::warn!(method, error = %error, "Sign-in failed (security)");
            } else {
                tracing::info!(method, error = %error, "Sign-in failed");
            }
        }
        _ => {}
    }
}
