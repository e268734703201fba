//! Sign-in routes driven through `tower::ServiceExt::oneshot` with mock
//! upstreams.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    response::Response,
    Router,
};
use portal_auth::config::{RedirectConfig, SessionConfig};
use portal_auth::mocks::{sample_identity, MockCredentialBackend, MockOAuth2Provider, MockSocialRegistry};
use portal_auth::roles::GroupRoleMapper;
use portal_auth::state::IdentitySource;
use portal_auth::{CredentialVerifier, OAuthProvider, SignInFlow, SignInReducer, SocialBridge, SessionTokenComposer};
use portal_web::{router, AppState, CORRELATION_ID_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const ORIGIN: &str = "https://portal.example.com";
const CSRF: &str = "csrf-token-for-tests";

type MockState = AppState<MockCredentialBackend, MockCredentialBackend, MockOAuth2Provider, MockSocialRegistry>;

fn state_with(primary: MockCredentialBackend, oauth: MockOAuth2Provider) -> MockState {
    let timeout = Duration::from_secs(1);
    AppState::new(SignInFlow::new(
        CredentialVerifier::new(primary, None, timeout),
        oauth,
        SocialBridge::new(MockSocialRegistry::new(), Arc::new(GroupRoleMapper::default()), timeout),
        SessionTokenComposer::new(&SessionConfig::new("route-test-secret-0123456789abcdef")),
        SignInReducer::new(
            RedirectConfig::new(ORIGIN),
            vec![OAuthProvider::Authentik, OAuthProvider::Google],
        ),
        timeout,
    ))
}

fn state() -> MockState {
    state_with(
        MockCredentialBackend::verifying(IdentitySource::OidcPassword).with_password("correct horse"),
        MockOAuth2Provider::new(),
    )
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

fn credentials_post(body: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/callback/credentials")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

fn set_cookies(response: &Response) -> Vec<String> {
    set_cookie_headers(response.headers())
}

fn set_cookie_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
// CSRF and discovery
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn csrf_endpoint_issues_cookie_and_token() {
    let response = send(router(state()), get("/api/auth/csrf", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_value(&response, "portal.csrf-token").unwrap();
    let body = json_body(response).await;
    assert_eq!(body["csrfToken"], cookie);
}

#[tokio::test]
async fn csrf_endpoint_reuses_existing_cookie() {
    let response = send(
        router(state()),
        get("/api/auth/csrf", Some(&format!("portal.csrf-token={CSRF}"))),
    )
    .await;

    assert!(set_cookies(&response).is_empty());
    assert_eq!(json_body(response).await["csrfToken"], CSRF);
}

#[tokio::test]
async fn providers_lists_credentials_and_enabled_sso() {
    let response = send(router(state()), get("/api/auth/providers", None)).await;
    let body = json_body(response).await;

    assert_eq!(body["credentials"]["type"], "credentials");
    assert_eq!(body["authentik"]["type"], "oidc");
    assert_eq!(body["google"]["signinUrl"], format!("{ORIGIN}/api/auth/signin/google"));
    assert!(body.get("github").is_none());
}

// ═══════════════════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn credentials_success_sets_session_cookie_and_redirects() {
    let response = send(
        router(state()),
        credentials_post(
            &format!("email=ada%40acme.test&password=correct+horse&csrfToken={CSRF}&callbackUrl=%2Freports"),
            &format!("portal.csrf-token={CSRF}"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{ORIGIN}/reports"));
    let cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("portal.session-token="))
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("Max-Age=2592000"));
}

#[tokio::test]
async fn credentials_with_foreign_callback_land_on_dashboard() {
    let response = send(
        router(state()),
        credentials_post(
            &format!("email=ada%40acme.test&password=correct+horse&csrfToken={CSRF}&callbackUrl=https%3A%2F%2Fevil.test%2F"),
            &format!("portal.csrf-token={CSRF}"),
        ),
    )
    .await;

    assert_eq!(location(&response), format!("{ORIGIN}/dashboard"));
}

#[tokio::test]
async fn credentials_with_control_characters_in_callback_land_on_dashboard() {
    for callback in ["https%3A%2F%2Fportal.example.com%2Freports%0Ax", "%2Freports%0D%0ASet-Cookie%3Ax%3D1"] {
        let response = send(
            router(state()),
            credentials_post(
                &format!("email=ada%40acme.test&password=correct+horse&csrfToken={CSRF}&callbackUrl={callback}"),
                &format!("portal.csrf-token={CSRF}"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{callback}");
        assert_eq!(location(&response), format!("{ORIGIN}/dashboard"));
        assert!(cookie_value(&response, "portal.session-token").is_some());
    }
}

#[tokio::test]
async fn wrong_password_redirects_to_login_without_session() {
    let response = send(
        router(state()),
        credentials_post(
            &format!("email=ada%40acme.test&password=wrong&csrfToken={CSRF}&callbackUrl=%2Freports"),
            &format!("portal.csrf-token={CSRF}"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("{ORIGIN}/login?error=CredentialsSignin&callbackUrl=%2Freports")
    );
    assert!(cookie_value(&response, "portal.session-token").is_none());
}

#[tokio::test]
async fn empty_password_never_reaches_the_backend() {
    let backend = MockCredentialBackend::verifying(IdentitySource::OidcPassword);
    let app = router(state_with(backend.clone(), MockOAuth2Provider::new()));

    let response = send(
        app,
        credentials_post(
            &format!("email=ada%40acme.test&password=&csrfToken={CSRF}"),
            &format!("portal.csrf-token={CSRF}"),
        ),
    )
    .await;

    assert_eq!(location(&response), format!("{ORIGIN}/login?error=MissingCredentials"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn mismatched_csrf_token_is_forbidden() {
    let backend = MockCredentialBackend::verifying(IdentitySource::OidcPassword);
    let app = router(state_with(backend.clone(), MockOAuth2Provider::new()));

    let response = send(
        app,
        credentials_post(
            "email=ada%40acme.test&password=pw&csrfToken=forged",
            &format!("portal.csrf-token={CSRF}"),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "MissingCSRF");
    assert_eq!(backend.call_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
// SSO
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sso_round_trip_through_cookies() {
    let state = state();
    let composer = state.flow.composer().clone();

    let started = send(router(state.clone()), get("/api/auth/signin/google?callbackUrl=%2Finbox", None)).await;
    assert_eq!(started.status(), StatusCode::FOUND);
    assert!(location(&started).starts_with("https://google.example.com/oauth/authorize?state="));
    let pending_token = cookie_value(&started, "portal.sso-state").unwrap();
    let pending = composer.verify_pending_sso(&pending_token).unwrap();
    assert!(location(&started).contains(&pending.state));

    let finished = send(
        router(state),
        get(
            &format!("/api/auth/callback/google?code=abc&state={}", pending.state),
            Some(&format!("portal.sso-state={pending_token}")),
        ),
    )
    .await;

    assert_eq!(finished.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&finished), format!("{ORIGIN}/inbox"));
    let session = cookie_value(&finished, "portal.session-token").unwrap();
    let claims = composer.verify(&session).unwrap();
    assert_eq!(claims.email, "test@example.com");
    assert_eq!(claims.provider, "social:google");
    assert!(set_cookies(&finished)
        .iter()
        .any(|c| c.starts_with("portal.sso-state=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn callback_without_pending_cookie_fails_and_skips_exchange() {
    let oauth = MockOAuth2Provider::new();
    let app = router(state_with(MockCredentialBackend::rejecting(), oauth.clone()));

    let response = send(app, get("/api/auth/callback/google?code=abc&state=guessed", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{ORIGIN}/login?error=OAuthCallback"));
    assert!(cookie_value(&response, "portal.session-token").is_none());
    assert_eq!(oauth.exchange_count(), 0);
}

#[tokio::test]
async fn unknown_provider_is_not_found() {
    let response = send(router(state()), get("/api/auth/signin/myspace", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let disabled = send(router(state()), get("/api/auth/signin/github", None)).await;
    assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════
// Session and sign-out
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn session_endpoint_is_empty_when_signed_out() {
    let response = send(router(state()), get("/api/auth/session", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn session_endpoint_decodes_cookie() {
    let state = state();
    let token = state
        .flow
        .composer()
        .compose(Some(&sample_identity(IdentitySource::OidcPassword)))
        .unwrap();

    let response = send(
        router(state),
        get("/api/auth/session", Some(&format!("portal.session-token={}", token.token))),
    )
    .await;

    assert!(set_cookies(&response).is_empty(), "fresh sessions are not re-issued");
    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], "user-42");
    assert_eq!(body["user"]["email"], "ada@acme.test");
    assert_eq!(body["user"]["tenantId"], "tenant-1");
    assert_eq!(body["provider"], "oidc_password");
}

#[tokio::test]
async fn stale_session_is_reissued_with_same_identity() {
    let state = state();
    let composer = state.flow.composer();
    let stale = composer
        .compose_at(
            Some(&sample_identity(IdentitySource::OidcPassword)),
            chrono::Utc::now() - chrono::Duration::hours(25),
        )
        .unwrap();

    let response = send(
        router(state.clone()),
        get("/api/auth/session", Some(&format!("portal.session-token={}", stale.token))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let reissued = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("portal.session-token="))
        .unwrap();
    assert!(reissued.contains("Max-Age=2592000"));
    let token = cookie_value(&response, "portal.session-token").unwrap();
    assert_ne!(token, stale.token);

    let claims = state.flow.composer().verify(&token).unwrap();
    assert!(claims.iat > stale.claims.iat);
    assert_eq!(claims.identity(), stale.claims.identity());
    assert_eq!(claims.provider, stale.claims.provider);

    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], "user-42");
    assert_eq!(body["user"]["email"], "ada@acme.test");
    assert_eq!(body["user"]["tenantId"], "tenant-1");
}

#[tokio::test]
async fn tampered_session_cookie_is_cleared() {
    let response = send(
        router(state()),
        get("/api/auth/session", Some("portal.session-token=eyJhbGciOiJIUzI1NiJ9.e30.forged")),
    )
    .await;

    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("portal.session-token=;")));
    assert_eq!(json_body(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn signout_clears_session_and_redirects_to_login() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signout")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, format!("portal.csrf-token={CSRF}; portal.session-token=x"))
        .body(Body::from(format!("csrfToken={CSRF}")))
        .unwrap();

    let response = send(router(state()), request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{ORIGIN}/login"));
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("portal.session-token=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn signout_requires_csrf_token() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signout")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("csrfToken="))
        .unwrap();

    let response = send(router(state()), request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ═══════════════════════════════════════════════════════════════════════
// Pages and middleware
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn login_page_shows_generic_message_and_escapes_callback() {
    let response = send(
        router(state()),
        get(
            "/login?error=CredentialsSignin&callbackUrl=%22%3E%3Cscript%3E",
            Some(&format!("portal.csrf-token={CSRF}")),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = text_body(response).await;
    assert!(html.contains("Invalid credentials"));
    assert!(html.contains(&format!(r#"name="csrfToken" value="{CSRF}""#)));
    assert!(html.contains("&quot;&gt;&lt;script&gt;"));
    assert!(!html.contains("<script>"));
    assert!(html.contains("/api/auth/signin/google"));
}

#[tokio::test]
async fn health_and_correlation_id() {
    let response = send(router(state()), get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let correlation_id = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(correlation_id).is_ok());
    assert_eq!(text_body(response).await, "ok");
}
