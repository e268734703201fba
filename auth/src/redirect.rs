//! Redirect Resolver.
//!
//! Computes where the browser goes after authentication. Callback URLs come
//! from the query string or form body and are untrusted: only same-origin
//! destinations survive, everything else is silently replaced by the default
//! landing path.
//!
//! | Callback | Result |
//! |----------|--------|
//! | missing, empty, `origin`, `origin/`, `/` | `origin` + default landing |
//! | `/path?q` | `origin/path?q` |
//! | `https://origin/path` (same scheme, host, port) | unchanged |
//! | anything else, or anything with control characters | `origin` + default landing |
//!
//! Admins are sent to the admin application when one is configured,
//! whatever the callback.

use crate::config::RedirectConfig;
use crate::state::Role;
use url::Url;

/// Resolves post-authentication destinations.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    origin: String,
    parsed_origin: Option<Url>,
    default_landing: String,
    admin_app_url: Option<String>,
}

impl RedirectResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: &RedirectConfig) -> Self {
        let origin = config.origin.trim_end_matches('/').to_string();
        let parsed_origin = Url::parse(&origin).ok();
        if parsed_origin.is_none() {
            tracing::warn!(origin = %origin, "Application origin is not a valid URL; every callback will be replaced");
        }
        Self {
            origin,
            parsed_origin,
            default_landing: config.default_landing.clone(),
            admin_app_url: config.admin_app_url.clone(),
        }
    }

    /// Application origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Final destination for a signed-in user.
    #[must_use]
    pub fn resolve(&self, callback_url: Option<&str>, role: Option<Role>) -> String {
        if let (Some(Role::Admin), Some(admin_url)) = (role, self.admin_app_url.as_deref()) {
            return admin_url.to_string();
        }
        self.resolve_callback(callback_url)
    }

    /// Same-origin destination for a callback, falling back to the default
    /// landing path.
    #[must_use]
    pub fn resolve_callback(&self, callback_url: Option<&str>) -> String {
        self.resolve_callback_or(callback_url, &self.default_landing)
    }

    /// Same-origin destination for a callback, falling back to
    /// `fallback_path`.
    #[must_use]
    pub fn resolve_callback_or(&self, callback_url: Option<&str>, fallback_path: &str) -> String {
        let fallback = format!("{}{fallback_path}", self.origin);

        let Some(callback) = callback_url.map(str::trim).filter(|c| !c.is_empty()) else {
            return fallback;
        };
        let Some(origin) = &self.parsed_origin else {
            return fallback;
        };
        // The URL parser strips or escapes control characters, so the parsed
        // form can pass while the raw string is not a valid header value.
        if callback.chars().any(char::is_control) {
            return Self::reject(callback, fallback);
        }

        // `//host` and `/\host` are protocol-relative, not paths.
        let relative =
            callback.starts_with('/') && !callback.starts_with("//") && !callback.starts_with("/\\");
        let candidate = if relative {
            format!("{}{callback}", self.origin)
        } else {
            callback.to_string()
        };

        let parsed = match Url::parse(&candidate) {
            Ok(parsed) if parsed.origin() == origin.origin() => parsed,
            _ => return Self::reject(callback, fallback),
        };

        if parsed.path() == "/" && parsed.query().is_none() && parsed.fragment().is_none() {
            return fallback;
        }

        if relative {
            parsed.into()
        } else {
            callback.to_string()
        }
    }

    fn reject(callback: &str, fallback: String) -> String {
        tracing::debug!(callback_url = ?callback, "Rejected callback URL outside the application origin");
        metrics::counter!("auth.redirect.rejected").increment(1);
        fallback
    }
}
