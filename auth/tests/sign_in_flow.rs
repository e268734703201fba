//! End-to-end sign-in flows against the in-memory providers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use portal_auth::bridge::SocialBridge;
use portal_auth::config::{RedirectConfig, SessionConfig, SocialFailurePolicy};
use portal_auth::mocks::{MockCredentialBackend, MockOAuth2Provider, MockSocialRegistry};
use portal_auth::providers::IdentityClaims;
use portal_auth::roles::GroupRoleMapper;
use portal_auth::state::{IdentitySource, SessionCompleteness, SignInMethod};
use portal_auth::{
    AuthError, Credential, CredentialVerifier, OAuthProvider, Role, SignInFlow, SignInPhase,
    SignInReducer, SignInState, SessionTokenComposer, SsoCallbackParams,
};
use std::sync::Arc;
use std::time::Duration;

const ORIGIN: &str = "https://portal.example.com";
const ADMIN_APP: &str = "https://admin.example.com";

type TestFlow =
    SignInFlow<MockCredentialBackend, MockCredentialBackend, MockOAuth2Provider, MockSocialRegistry>;

struct Harness {
    primary: MockCredentialBackend,
    fallback: MockCredentialBackend,
    oauth: MockOAuth2Provider,
    registry: MockSocialRegistry,
    redirect: RedirectConfig,
    policy: SocialFailurePolicy,
}

impl Harness {
    fn new() -> Self {
        Self {
            primary: MockCredentialBackend::verifying(IdentitySource::OidcPassword),
            fallback: MockCredentialBackend::verifying(IdentitySource::Legacy),
            oauth: MockOAuth2Provider::new(),
            registry: MockSocialRegistry::new(),
            redirect: RedirectConfig::new(ORIGIN),
            policy: SocialFailurePolicy::Reject,
        }
    }

    fn flow(&self) -> TestFlow {
        let timeout = Duration::from_secs(2);
        SignInFlow::new(
            CredentialVerifier::new(self.primary.clone(), Some(self.fallback.clone()), timeout),
            self.oauth.clone(),
            SocialBridge::new(self.registry.clone(), Arc::new(GroupRoleMapper::default()), timeout)
                .with_failure_policy(self.policy),
            SessionTokenComposer::new(&SessionConfig::new("integration-test-secret-0123456789")),
            SignInReducer::new(
                self.redirect.clone(),
                vec![OAuthProvider::Authentik, OAuthProvider::Google, OAuthProvider::GitHub],
            ),
            timeout,
        )
    }
}

async fn sso(flow: &TestFlow, provider: OAuthProvider, callback: Option<&str>) -> SignInState {
    let started = flow.begin_sso(provider, callback.map(ToString::to_string)).await;
    assert_eq!(started.phase, SignInPhase::SsoInitiated);
    let pending = started.pending_sso.expect("pending SSO record");
    let state = pending.state.clone();

    flow.complete_sso(
        provider,
        Some(pending),
        SsoCallbackParams {
            code: Some("auth-code".to_string()),
            state: Some(state),
            error: None,
        },
    )
    .await
}

fn admin_claims() -> IdentityClaims {
    IdentityClaims {
        sub: "idp-admin".to_string(),
        email: Some("ops@acme.test".to_string()),
        email_verified: Some(true),
        name: Some("Ops".to_string()),
        groups: vec!["staff".to_string(), "authentik Admins".to_string()],
        tenant_id: Some("tenant-1".to_string()),
        ..IdentityClaims::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_empty_password_fails_without_upstream_calls() {
    let harness = Harness::new();
    let flow = harness.flow();

    let state = flow
        .sign_in_with_credentials(Credential::new("a@x.com", ""), None)
        .await;

    assert_eq!(state.phase, SignInPhase::CredentialsRejected);
    assert_eq!(state.error, Some(AuthError::MissingCredential { field: "password" }));
    assert!(state.session.is_none());
    assert_eq!(harness.primary.call_count(), 0);
    assert_eq!(harness.fallback.call_count(), 0);
}

#[tokio::test]
async fn test_empty_email_fails_without_upstream_calls() {
    let harness = Harness::new();
    let flow = harness.flow();

    let state = flow
        .sign_in_with_credentials(Credential::new("  ", "hunter2"), None)
        .await;

    assert_eq!(state.error, Some(AuthError::MissingCredential { field: "email" }));
    assert_eq!(harness.primary.call_count(), 0);
    assert_eq!(harness.fallback.call_count(), 0);
}

#[tokio::test]
async fn test_unreachable_primary_falls_back_to_legacy() {
    let harness = Harness {
        primary: MockCredentialBackend::unavailable(),
        ..Harness::new()
    };
    let flow = harness.flow();

    let state = flow
        .sign_in_with_credentials(Credential::new("ada@acme.test", "pw"), None)
        .await;

    assert_eq!(state.phase, SignInPhase::Redirected);
    let session = state.session.unwrap();
    assert_eq!(session.claims.provider, "legacy");
    assert_eq!(session.claims.sub, "user-42");
    assert_eq!(session.claims.tenant_id.as_deref(), Some("tenant-1"));
    assert_eq!(state.redirect_to.as_deref(), Some("https://portal.example.com/dashboard"));
    assert_eq!(harness.primary.call_count(), 1);
    assert_eq!(harness.fallback.call_count(), 1);
}

#[tokio::test]
async fn test_failing_both_backends_is_idempotent() {
    let harness = Harness {
        primary: MockCredentialBackend::unavailable(),
        fallback: MockCredentialBackend::rejecting(),
        ..Harness::new()
    };
    let flow = harness.flow();
    let attempt = || flow.sign_in_with_credentials(Credential::new("ada@acme.test", "wrong"), Some("/reports".into()));

    let first = attempt().await;
    let second = attempt().await;

    assert_eq!(first, second);
    assert_eq!(first.phase, SignInPhase::CredentialsRejected);
    assert_eq!(first.error, Some(AuthError::AuthenticationFailed));
    assert!(first.session.is_none());
    assert!(first.identity.is_none());
    assert!(first.redirect_to.is_none());
    assert_eq!(harness.fallback.call_count(), 2);
}

#[tokio::test]
async fn test_wrong_password_then_right_password() {
    let harness = Harness {
        primary: MockCredentialBackend::verifying(IdentitySource::OidcPassword).with_password("correct"),
        ..Harness::new()
    };
    let flow = harness.flow();

    let rejected = flow
        .sign_in_with_credentials(Credential::new("ada@acme.test", "wrong"), None)
        .await;
    let accepted = flow
        .sign_in_with_credentials(Credential::new("ada@acme.test", "correct"), None)
        .await;

    assert_eq!(rejected.phase, SignInPhase::CredentialsRejected);
    assert_eq!(accepted.phase, SignInPhase::Redirected);
    // An explicit rejection never reaches the fallback.
    assert_eq!(harness.fallback.call_count(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_show_generic_message() {
    let harness = Harness {
        primary: MockCredentialBackend::rejecting(),
        fallback: MockCredentialBackend::unavailable(),
        ..Harness::new()
    };

    let state = harness
        .flow()
        .sign_in_with_credentials(Credential::new("ada@acme.test", "pw"), None)
        .await;

    let error = state.error.unwrap();
    assert_eq!(error.user_message(), "Invalid credentials");
    assert_eq!(error.error_code(), "CredentialsSignin");
}

// ═══════════════════════════════════════════════════════════════════════════
// SSO
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_foreign_callback_lands_on_dashboard() {
    let harness = Harness::new();
    let flow = harness.flow();

    let state = sso(&flow, OAuthProvider::Authentik, Some("https://evil.example/steal")).await;

    assert_eq!(state.phase, SignInPhase::Redirected);
    assert_eq!(state.redirect_to.as_deref(), Some("https://portal.example.com/dashboard"));
}

#[tokio::test]
async fn test_admin_group_yields_admin_role() {
    let harness = Harness {
        oauth: MockOAuth2Provider::new().with_claims(OAuthProvider::Authentik, admin_claims()),
        ..Harness::new()
    };

    let state = sso(&harness.flow(), OAuthProvider::Authentik, Some("/reports")).await;

    let session = state.session.unwrap();
    assert_eq!(session.claims.role, Role::Admin);
    assert_eq!(session.claims.provider, "sso:authentik");
    assert_eq!(state.redirect_to.as_deref(), Some("https://portal.example.com/reports"));
}

#[tokio::test]
async fn test_admin_is_sent_to_admin_application() {
    let harness = Harness {
        oauth: MockOAuth2Provider::new().with_claims(OAuthProvider::Authentik, admin_claims()),
        redirect: RedirectConfig::new(ORIGIN).with_admin_app_url(ADMIN_APP),
        ..Harness::new()
    };

    let state = sso(&harness.flow(), OAuthProvider::Authentik, Some("/reports")).await;

    assert_eq!(state.role(), Some(Role::Admin));
    assert_eq!(state.redirect_to.as_deref(), Some(ADMIN_APP));
}

#[tokio::test]
async fn test_role_is_admin_only_with_the_admin_group() {
    for (groups, expected) in [
        (vec![], Role::User),
        (vec!["staff"], Role::User),
        (vec!["authentik admins"], Role::User),
        (vec!["authentik Admins"], Role::Admin),
        (vec!["staff", "authentik Admins"], Role::Admin),
    ] {
        let claims = IdentityClaims {
            groups: groups.iter().map(ToString::to_string).collect(),
            ..admin_claims()
        };
        let harness = Harness {
            oauth: MockOAuth2Provider::new().with_claims(OAuthProvider::Authentik, claims),
            redirect: RedirectConfig::new(ORIGIN).with_admin_app_url(ADMIN_APP),
            ..Harness::new()
        };

        let state = sso(&harness.flow(), OAuthProvider::Authentik, None).await;

        assert_eq!(state.session.unwrap().claims.role, expected, "groups: {groups:?}");
    }
}

#[tokio::test]
async fn test_first_social_login_creates_identity_once() {
    let harness = Harness::new();
    let flow = harness.flow();

    let first = sso(&flow, OAuthProvider::Google, None).await;
    let second = sso(&flow, OAuthProvider::Google, None).await;

    let first = first.session.unwrap().claims;
    let second = second.session.unwrap().claims;
    assert_eq!(first.sub, second.sub);
    assert_eq!(first.provider, "social:google");
    assert_eq!(harness.registry.created_count(), 1);
    assert_eq!(harness.registry.call_count(), 2);
}

#[tokio::test]
async fn test_same_email_on_other_provider_is_a_separate_registration() {
    let harness = Harness::new();
    let flow = harness.flow();

    let google = sso(&flow, OAuthProvider::Google, None).await;
    let github = sso(&flow, OAuthProvider::GitHub, None).await;

    assert_ne!(google.session.unwrap().claims.sub, github.session.unwrap().claims.sub);
    assert_eq!(harness.registry.created_count(), 2);
}

#[tokio::test]
async fn test_social_registry_failure_rejects_by_default() {
    let harness = Harness {
        registry: MockSocialRegistry::failing(),
        ..Harness::new()
    };

    let state = sso(&harness.flow(), OAuthProvider::Google, None).await;

    assert_eq!(state.phase, SignInPhase::SsoFailed);
    assert_eq!(state.error, Some(AuthError::AuthenticationFailed));
    assert!(state.session.is_none());
}

#[tokio::test]
async fn test_social_registry_failure_degrades_when_configured() {
    let harness = Harness {
        registry: MockSocialRegistry::failing(),
        policy: SocialFailurePolicy::Degrade,
        ..Harness::new()
    };

    let state = sso(&harness.flow(), OAuthProvider::Google, None).await;

    assert_eq!(state.phase, SignInPhase::Redirected);
    let claims = state.session.unwrap().claims;
    assert!(claims.degraded);
    assert_eq!(claims.completeness(), SessionCompleteness::Degraded);
    assert_eq!(claims.sub, "google:oauth_user_123");
    assert_eq!(claims.tenant_id, None);
}

#[tokio::test]
async fn test_forged_state_fails_sso_without_code_exchange() {
    let harness = Harness::new();
    let flow = harness.flow();
    let started = flow.begin_sso(OAuthProvider::Google, None).await;

    let state = flow
        .complete_sso(
            OAuthProvider::Google,
            started.pending_sso,
            SsoCallbackParams {
                code: Some("auth-code".to_string()),
                state: Some("forged".to_string()),
                error: None,
            },
        )
        .await;

    assert_eq!(state.phase, SignInPhase::SsoFailed);
    assert_eq!(state.error, Some(AuthError::OAuthStateInvalid));
    assert_eq!(harness.oauth.exchange_count(), 0);
}

#[tokio::test]
async fn test_pending_record_for_other_provider_is_refused() {
    let harness = Harness::new();
    let flow = harness.flow();
    let started = flow.begin_sso(OAuthProvider::Google, None).await;
    let pending = started.pending_sso.unwrap();
    let csrf = pending.state.clone();

    let state = flow
        .complete_sso(
            OAuthProvider::GitHub,
            Some(pending),
            SsoCallbackParams {
                code: Some("auth-code".to_string()),
                state: Some(csrf),
                error: None,
            },
        )
        .await;

    assert_eq!(state.error, Some(AuthError::OAuthStateInvalid));
    assert_eq!(state.method, Some(SignInMethod::Sso(OAuthProvider::GitHub)));
}

#[tokio::test]
async fn test_provider_error_fails_sso() {
    let harness = Harness::new();
    let flow = harness.flow();
    let started = flow.begin_sso(OAuthProvider::Authentik, None).await;
    let pending = started.pending_sso.unwrap();
    let csrf = pending.state.clone();

    let state = flow
        .complete_sso(
            OAuthProvider::Authentik,
            Some(pending),
            SsoCallbackParams {
                code: None,
                state: Some(csrf),
                error: Some("access_denied".to_string()),
            },
        )
        .await;

    assert_eq!(state.phase, SignInPhase::SsoFailed);
    assert_eq!(state.error, Some(AuthError::AuthenticationFailed));
    assert_eq!(harness.oauth.exchange_count(), 0);
}

#[tokio::test]
async fn test_disabled_provider_cannot_start() {
    let harness = Harness::new();

    let state = harness.flow().begin_sso(OAuthProvider::Microsoft, None).await;

    assert_eq!(state.phase, SignInPhase::SsoFailed);
    assert_eq!(state.error, Some(AuthError::InvalidOAuthProvider));
    assert!(state.pending_sso.is_none());
}
