//! Login page.
//!
//! One page serves both the entry and the error state: failed attempts
//! redirect to `/login?error=CODE`, and the code is turned back into the
//! generic user-facing message.

use crate::handlers::auth::{append_cookie, csrf_token};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use portal_auth::providers::{CredentialBackend, OAuth2Provider, SocialRegistry};
use portal_auth::AuthError;
use serde::Deserialize;
use std::fmt::Write as _;

/// Query of `GET /login`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginQuery {
    /// Error code from a failed attempt.
    pub error: Option<String>,
    /// Destination to carry through the next attempt (untrusted).
    pub callback_url: Option<String>,
}

/// Render the login page.
///
/// # Endpoint
///
/// ```text
/// GET /login?error=...&callbackUrl=...
/// ```
#[allow(clippy::unused_async)]
pub async fn login_page<P, F, O, R>(
    State(state): State<AppState<P, F, O, R>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Response
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    let (csrf, set_cookie) = csrf_token(&state, &headers);
    let callback_url = query.callback_url.unwrap_or_default();

    let error_banner = query.error.as_deref().map_or_else(String::new, |code| {
        format!(
            r#"<p class="error" role="alert">{}</p>"#,
            escape_html(AuthError::message_for_code(code))
        )
    });

    let mut sso_links = String::new();
    for provider in state.flow.sso_providers() {
        let href = format!(
            "/api/auth/signin/{}?{}",
            provider.as_str(),
            serde_urlencoded::to_string([("callbackUrl", callback_url.as_str())]).unwrap_or_default()
        );
        let _ = write!(
            sso_links,
            r#"<a class="sso" href="{}">Continue with {}</a>"#,
            escape_html(&href),
            escape_html(provider.display_name())
        );
    }

    let page = format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<main>
<h1>Sign in</h1>
{error_banner}
<form method="post" action="/api/auth/callback/credentials">
<input type="hidden" name="csrfToken" value="{csrf}">
<input type="hidden" name="callbackUrl" value="{callback}">
<label>Email <input type="email" name="email" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>
{sso_links}
</main>
</body>
</html>
"#,
        csrf = escape_html(&csrf),
        callback = escape_html(&callback_url),
    );

    let mut response = Html(page).into_response();
    if let Some(cookie) = set_cookie {
        append_cookie(&mut response, &cookie);
    }
    response
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
