//! Sign-in constants.

/// Identity source identifiers recorded in the session's `provider` claim.
pub mod login_methods {
    /// OIDC resource-owner password grant.
    pub const OIDC_PASSWORD: &str = "oidc_password";

    /// Legacy auth service direct login.
    pub const LEGACY: &str = "legacy";

    /// Prefix for first-party SSO logins (`sso:authentik`).
    pub const SSO_PREFIX: &str = "sso:";

    /// Prefix for social logins (`social:google`).
    pub const SOCIAL_PREFIX: &str = "social:";
}

/// Group whose members are mapped to the admin role by default.
pub const DEFAULT_ADMIN_GROUP: &str = "authentik Admins";

/// Landing path used whenever a callback URL is missing or rejected.
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// Sign-in page; also serves the error state.
pub const LOGIN_PATH: &str = "/login";

/// Platform identifier sent to the legacy and social-login endpoints.
pub const DEFAULT_PLATFORM: &str = "portal";

/// Default session lifetime: 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Default age after which a valid session token is re-signed: 24 hours.
pub const SESSION_UPDATE_AGE_SECS: i64 = 24 * 60 * 60;

/// Upper bound for configured session ages: 10 years.
pub const MAX_SESSION_AGE_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Lifetime of the pending-SSO state between redirect and callback.
pub const SSO_STATE_TTL_SECS: i64 = 5 * 60;

/// Default bound on each upstream identity call.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 8;

/// Scopes requested from the first-party OIDC provider.
pub const OIDC_SCOPES: &str = "openid email profile offline_access";
