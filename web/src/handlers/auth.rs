//! Sign-in routes.
//!
//! # Endpoints
//!
//! ```text
//! GET  /api/auth/csrf                  → {csrfToken}
//! GET  /api/auth/providers             → enabled sign-in methods
//! POST /api/auth/callback/credentials  → session cookie + 303, or 303 /login?error=
//! GET  /api/auth/signin/:provider      → pending-SSO cookie + 302 to the provider
//! GET  /api/auth/callback/:provider    → session cookie + 303, or 303 /login?error=
//! GET  /api/auth/session               → decoded session, {} when signed out
//! POST /api/auth/signout               → clears the session, 303
//! ```
//!
//! Browser flows never answer a failed sign-in with an error status: the
//! browser is sent back to `/login` with a short error code. Only a bad CSRF
//! token or an unknown provider produce an [`AppError`].

use crate::cookies::{parse_cookie, CSRF_COOKIE, PENDING_SSO_COOKIE, SESSION_COOKIE};
use crate::error::AppError;
use crate::extractors::{ClientIp, CorrelationId, UserAgent};
use crate::state::AppState;
use crate::WebResult;
use axum::{
    extract::{Path, Query, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use portal_auth::constants::LOGIN_PATH;
use portal_auth::providers::{CredentialBackend, OAuth2Provider, SocialRegistry};
use portal_auth::utils::{generate_token, tokens_match};
use portal_auth::{
    AuthError, Credential, OAuthProvider, SessionClaims, SignInState, SsoCallbackParams,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════════════════

/// CSRF token response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    /// Token to echo in form posts.
    pub csrf_token: String,
}

/// One entry of the providers listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    /// Provider id, as used in route paths.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `credentials`, `oidc` or `oauth`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Where the browser starts this method.
    pub signin_url: String,
    /// Where the method completes.
    pub callback_url: String,
}

/// Email/password form.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsForm {
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Echoed CSRF token.
    #[serde(default)]
    pub csrf_token: String,
    /// Requested destination (untrusted).
    pub callback_url: Option<String>,
}

// Never log the password.
impl std::fmt::Debug for CredentialsForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsForm")
            .field("email", &self.email)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

/// Query of `GET /api/auth/signin/:provider`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInQuery {
    /// Requested destination (untrusted).
    pub callback_url: Option<String>,
}

/// Query a provider sends to `GET /api/auth/callback/:provider`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed state parameter.
    pub state: Option<String>,
    /// Provider-reported error.
    pub error: Option<String>,
}

/// Sign-out form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutForm {
    /// Echoed CSRF token.
    #[serde(default)]
    pub csrf_token: String,
    /// Where to go afterwards (untrusted).
    pub callback_url: Option<String>,
}

/// Signed-in user, as exposed to the frontends.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: String,
    /// Avatar URL.
    pub image: Option<String>,
    /// `admin` or `user`.
    pub role: String,
    /// Tenant.
    pub tenant_id: Option<String>,
    /// Brand.
    pub brand: Option<String>,
}

/// Body of `GET /api/auth/session` for a signed-in user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// The user.
    pub user: SessionUser,
    /// Session expiry (RFC 3339).
    pub expires: String,
    /// How the identity was established (e.g. `oidc_password`, `social:google`).
    pub provider: String,
    /// Set when the identity came from a social provider without a backend
    /// account.
    pub degraded: bool,
    /// Upstream access token for calls to the platform APIs.
    pub access_token: String,
}

impl From<&SessionClaims> for SessionView {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user: SessionUser {
                id: claims.sub.clone(),
                name: claims.name.clone(),
                email: claims.email.clone(),
                image: claims.image.clone(),
                role: claims.role.as_str().to_string(),
                tenant_id: claims.tenant_id.clone(),
                brand: claims.brand.clone(),
            },
            expires: claims.expires_at().to_rfc3339(),
            provider: claims.provider.clone(),
            degraded: claims.degraded,
            access_token: claims.access_token.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CSRF and discovery
// ═══════════════════════════════════════════════════════════════════════

/// Issue the CSRF token, reusing the one already in the browser.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/csrf
/// ```
#[allow(clippy::unused_async)]
pub async fn csrf<P, F, O, R>(State(state): State<AppState<P, F, O, R>>, headers: HeaderMap) -> Response
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let (token, set_cookie) = csrf_token(&state, &headers);
    let mut response = Json(CsrfResponse { csrf_token: token }).into_response();
    if let Some(cookie) = set_cookie {
        append_cookie(&mut response, &cookie);
    }
    response
}

/// List enabled sign-in methods, keyed by provider id.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/providers
/// ```
#[allow(clippy::unused_async)]
pub async fn providers<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
) -> Json<BTreeMap<String, ProviderView>>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let origin = state.flow.resolver().origin();
    let mut views = BTreeMap::new();
    views.insert(
        "credentials".to_string(),
        ProviderView {
            id: "credentials".to_string(),
            name: "Email".to_string(),
            kind: "credentials".to_string(),
            signin_url: format!("{origin}{LOGIN_PATH}"),
            callback_url: format!("{origin}/api/auth/callback/credentials"),
        },
    );
    for provider in state.flow.sso_providers() {
        let id = provider.as_str();
        views.insert(
            id.to_string(),
            ProviderView {
                id: id.to_string(),
                name: provider.display_name().to_string(),
                kind: if provider.is_first_party() { "oidc" } else { "oauth" }.to_string(),
                signin_url: format!("{origin}/api/auth/signin/{id}"),
                callback_url: format!("{origin}/api/auth/callback/{id}"),
            },
        );
    }
    Json(views)
}

// ═══════════════════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════════════════

/// Sign in with email and password.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/callback/credentials
/// Content-Type: application/x-www-form-urlencoded
///
/// email=...&password=...&csrfToken=...&callbackUrl=...
/// ```
///
/// # Errors
///
/// Returns `403` when the CSRF token does not match the cookie. Every other
/// failure redirects to the login page.
pub async fn credentials_callback<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    correlation_id: CorrelationId,
    client_ip: ClientIp,
    user_agent: UserAgent,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> WebResult<Response>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    verify_csrf(&headers, &form.csrf_token)?;
    tracing::debug!(
        correlation_id = %correlation_id.0,
        client_ip = %client_ip.0,
        user_agent = %user_agent.0,
        "Credentials submitted"
    );

    let callback_url = form.callback_url.clone();
    let outcome = state
        .flow
        .sign_in_with_credentials(Credential::new(form.email, form.password), form.callback_url)
        .await;

    Ok(finish_sign_in(&state, outcome, callback_url.as_deref(), Vec::new()))
}

// ═══════════════════════════════════════════════════════════════════════
// SSO
// ═══════════════════════════════════════════════════════════════════════

/// Send the browser to a provider.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/signin/:provider?callbackUrl=...
/// ```
///
/// # Errors
///
/// Returns `404` for an unknown or disabled provider and `500` when the
/// pending-SSO record cannot be signed.
pub async fn sso_signin<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
) -> WebResult<Response>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let provider: OAuthProvider = provider.parse()?;
    let callback_url = query.callback_url.clone();
    let outcome = state.flow.begin_sso(provider, query.callback_url).await;

    let (Some(pending), Some(authorization_url)) = (outcome.pending_sso, outcome.authorization_url) else {
        return match outcome.error {
            Some(AuthError::InvalidOAuthProvider) => Err(AuthError::InvalidOAuthProvider.into()),
            error => Ok(login_error_redirect(&state, error.as_ref(), callback_url.as_deref())),
        };
    };

    let composer = state.flow.composer();
    let pending_token = composer.sign_pending_sso(&pending)?;
    let cookie = state.cookies.set(
        PENDING_SSO_COOKIE,
        &pending_token,
        Some(composer.sso_state_ttl().num_seconds()),
    );
    Ok(redirect(StatusCode::FOUND, &authorization_url, &[cookie]))
}

/// Complete a provider sign-in.
///
/// The pending-SSO cookie is always cleared: a callback is single use.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/callback/:provider?code=...&state=...
/// ```
///
/// # Errors
///
/// Returns `404` for an unknown provider. Every other failure redirects to
/// the login page.
pub async fn sso_callback<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> WebResult<Response>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let provider: OAuthProvider = provider.parse()?;
    let pending = parse_cookie(&headers, PENDING_SSO_COOKIE).and_then(|token| {
        state
            .flow
            .composer()
            .verify_pending_sso(&token)
            .inspect_err(|e| tracing::debug!(error = %e, "Discarding pending SSO cookie"))
            .ok()
    });
    let callback_url = pending.as_ref().and_then(|p| p.callback_url.clone());

    let params = SsoCallbackParams {
        code: query.code,
        state: query.state,
        error: query.error,
    };
    let outcome = state.flow.complete_sso(provider, pending, params).await;

    let clear_pending = state.cookies.clear(PENDING_SSO_COOKIE);
    Ok(finish_sign_in(&state, outcome, callback_url.as_deref(), vec![clear_pending]))
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Decode the session cookie.
///
/// Answers `{}` when there is no valid session (clearing a stale cookie) and
/// re-issues the cookie when it is due for refresh.
///
/// # Endpoint
///
/// ```text
/// GET /api/auth/session
/// ```
///
/// # Errors
///
/// Returns `500` when a refreshed token cannot be signed.
pub async fn session<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    headers: HeaderMap,
) -> WebResult<Response>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let Some(token) = parse_cookie(&headers, SESSION_COOKIE) else {
        return Ok(Json(serde_json::json!({})).into_response());
    };

    let composer = state.flow.composer();
    let claims = match composer.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting session cookie");
            let mut response = Json(serde_json::json!({})).into_response();
            append_cookie(&mut response, &state.cookies.clear(SESSION_COOKIE));
            return Ok(response);
        }
    };

    if !composer.needs_refresh(&claims, Utc::now()) {
        return Ok(Json(SessionView::from(&claims)).into_response());
    }

    let refreshed = composer.refresh(&claims)?;
    metrics::counter!("auth.session.refreshed").increment(1);
    tracing::debug!(user_id = %refreshed.claims.sub, "Session refreshed");

    let mut response = Json(SessionView::from(&refreshed.claims)).into_response();
    append_cookie(
        &mut response,
        &state
            .cookies
            .set(SESSION_COOKIE, &refreshed.token, Some(composer.max_age().num_seconds())),
    );
    Ok(response)
}

/// Sign out.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/signout
/// Content-Type: application/x-www-form-urlencoded
///
/// csrfToken=...&callbackUrl=...
/// ```
///
/// # Errors
///
/// Returns `403` when the CSRF token does not match the cookie.
pub async fn signout<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    headers: HeaderMap,
    Form(form): Form<SignOutForm>,
) -> WebResult<Response>
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    verify_csrf(&headers, &form.csrf_token)?;

    if let Some(claims) = parse_cookie(&headers, SESSION_COOKIE)
        .and_then(|token| state.flow.composer().verify(&token).ok())
    {
        tracing::info!(user_id = %claims.sub, "Signed out");
    }
    metrics::counter!("auth.sign_out").increment(1);

    let target = state
        .flow
        .resolver()
        .resolve_callback_or(form.callback_url.as_deref(), LOGIN_PATH);
    Ok(redirect(StatusCode::SEE_OTHER, &target, &[state.cookies.clear(SESSION_COOKIE)]))
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// CSRF token from the cookie, or a new one together with its `Set-Cookie`
/// value.
pub(crate) fn csrf_token<P, F, O, R>(
    state: &AppState<P, F, O, R>,
    headers: &HeaderMap,
) -> (String, Option<String>) {
    match parse_cookie(headers, CSRF_COOKIE) {
        Some(token) => (token, None),
        None => {
            let token = generate_token();
            let cookie = state.cookies.set(CSRF_COOKIE, &token, None);
            (token, Some(cookie))
        }
    }
}

fn verify_csrf(headers: &HeaderMap, submitted: &str) -> Result<(), AppError> {
    let expected = parse_cookie(headers, CSRF_COOKIE).unwrap_or_default();
    if tokens_match(&expected, submitted) {
        Ok(())
    } else {
        tracing::warn!("CSRF token mismatch");
        metrics::counter!("auth.csrf.rejected").increment(1);
        Err(AppError::csrf_mismatch())
    }
}

/// Turn a finished attempt into the browser response.
fn finish_sign_in<P, F, O, R>(
    state: &AppState<P, F, O, R>,
    outcome: SignInState,
    callback_url: Option<&str>,
    mut cookies: Vec<String>,
) -> Response
where
    P: CredentialBackend,
    F: CredentialBackend,
    O: OAuth2Provider,
    R: SocialRegistry,
{
    match (outcome.session, outcome.redirect_to) {
        (Some(session), Some(target)) => {
            let max_age = state.flow.composer().max_age().num_seconds();
            cookies.push(state.cookies.set(SESSION_COOKIE, &session.token, Some(max_age)));
            redirect(StatusCode::SEE_OTHER, &target, &cookies)
        }
        _ => {
            let mut response = login_error_redirect(state, outcome.error.as_ref(), callback_url);
            for cookie in &cookies {
                append_cookie(&mut response, cookie);
            }
            response
        }
    }
}

/// 303 to `/login?error=CODE&callbackUrl=...`.
fn login_error_redirect<P, F, O, R>(
    state: &AppState<P, F, O, R>,
    error: Option<&AuthError>,
    callback_url: Option<&str>,
) -> Response
where
    P: CredentialBackend,
    F: CredentialBackend,
    O: OAuth2Provider,
    R: SocialRegistry,
{
    let code = error.map_or("CredentialsSignin", AuthError::error_code);
    let mut params = vec![("error", code)];
    if let Some(callback_url) = callback_url.filter(|c| !c.is_empty()) {
        params.push(("callbackUrl", callback_url));
    }
    let query = serde_urlencoded::to_string(&params).unwrap_or_else(|_| format!("error={code}"));
    let target = format!("{}{LOGIN_PATH}?{query}", state.flow.resolver().origin());
    redirect(StatusCode::SEE_OTHER, &target, &[])
}

/// Redirect response carrying `Set-Cookie` headers.
fn redirect(status: StatusCode, location: &str, cookies: &[String]) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return AppError::internal("Invalid redirect target").into_response();
    };
    let mut response = status.into_response();
    response.headers_mut().insert(LOCATION, location);
    for cookie in cookies {
        append_cookie(&mut response, cookie);
    }
    response
}

pub(crate) fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}
