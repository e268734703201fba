//! Sign-in cookies.
//!
//! | Cookie | Contents | Lifetime |
//! |--------|----------|----------|
//! | `portal.session-token` | signed session token | session max age |
//! | `portal.csrf-token` | CSRF token for form posts | browser session |
//! | `portal.sso-state` | signed pending-SSO record | SSO state TTL |
//!
//! All are `HttpOnly`, `SameSite=Lax`, `Path=/`, and `Secure` when the
//! application origin is https.

use axum::http::{header::COOKIE, HeaderMap};

/// Session token cookie.
pub const SESSION_COOKIE: &str = "portal.session-token";

/// CSRF token cookie.
pub const CSRF_COOKIE: &str = "portal.csrf-token";

/// Pending-SSO cookie.
pub const PENDING_SSO_COOKIE: &str = "portal.sso-state";

/// Attributes shared by every cookie the service sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CookieSettings {
    /// Add the `Secure` attribute.
    pub secure: bool,
}

impl CookieSettings {
    /// Create settings.
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `Set-Cookie` value for `name`, expiring after `max_age_secs` (or with
    /// the browser session when `None`).
    #[must_use]
    pub fn set(&self, name: &str, value: &str, max_age_secs: Option<i64>) -> String {
        let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
        if let Some(max_age) = max_age_secs {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value removing `name`.
    #[must_use]
    pub fn clear(&self, name: &str) -> String {
        let mut cookie =
            format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Read a cookie from every `Cookie` header of a request.
#[must_use]
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
