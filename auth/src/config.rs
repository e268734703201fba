//! Sign-in configuration.
//!
//! Every endpoint, secret and policy used by the flow lives here. Values are
//! provided by the application (usually through [`AuthConfig::from_env`]) and
//! validated once at startup.

use crate::constants::{
    DEFAULT_ADMIN_GROUP, DEFAULT_LANDING_PATH, DEFAULT_PLATFORM, DEFAULT_UPSTREAM_TIMEOUT_SECS,
    MAX_SESSION_AGE_SECS, OIDC_SCOPES, SESSION_MAX_AGE_SECS, SESSION_UPDATE_AGE_SECS, SSO_STATE_TTL_SECS,
};
use crate::state::OAuthProvider;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Startup configuration error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    /// A variable has a value that cannot be used.
    #[error("Invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A variable holds something that is not an http(s) URL.
    #[error("Invalid URL in {var}: {value}")]
    InvalidUrl {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development: documented localhost defaults apply.
    #[default]
    Development,
    /// Production: required URLs and secrets must be set.
    Production,
}

impl Environment {
    fn parse(value: Option<String>) -> Result<Self, ConfigError> {
        match value.as_deref().map(str::trim) {
            None | Some("" | "development" | "dev" | "local" | "test") => Ok(Self::Development),
            Some("production" | "prod") => Ok(Self::Production),
            Some(other) => Err(ConfigError::Invalid {
                var: "APP_ENV",
                reason: format!("unknown environment '{other}'"),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Strategy
// ═══════════════════════════════════════════════════════════════════════

/// Identity system tried first for email/password sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryProvider {
    /// OIDC resource-owner password grant against the first-party IdP.
    #[default]
    Oidc,
    /// Legacy auth service direct login.
    Legacy,
}

/// Identity system tried when the primary gives no conclusive answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackProvider {
    /// Legacy auth service direct login.
    #[default]
    Legacy,
    /// No fallback.
    None,
}

/// What to do when the social-login registration call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocialFailurePolicy {
    /// Fail the sign-in.
    #[default]
    Reject,
    /// Continue with a degraded session built from the provider profile.
    Degrade,
}

/// Which identity systems are consulted, and in what order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStrategy {
    /// Primary credential backend.
    pub primary: PrimaryProvider,

    /// Fallback credential backend.
    pub fallback: FallbackProvider,

    /// Social providers offered on the login page.
    pub social_providers: Vec<OAuthProvider>,

    /// Bridge failure policy.
    pub social_failure_policy: SocialFailurePolicy,
}

impl AuthStrategy {
    /// Create a strategy with no social providers.
    #[must_use]
    pub const fn new(primary: PrimaryProvider, fallback: FallbackProvider) -> Self {
        Self {
            primary,
            fallback,
            social_providers: Vec::new(),
            social_failure_policy: SocialFailurePolicy::Reject,
        }
    }

    /// Set the social providers.
    #[must_use]
    pub fn with_social_providers(mut self, providers: Vec<OAuthProvider>) -> Self {
        self.social_providers = providers;
        self
    }

    /// Set the bridge failure policy.
    #[must_use]
    pub const fn with_social_failure_policy(mut self, policy: SocialFailurePolicy) -> Self {
        self.social_failure_policy = policy;
        self
    }

    /// Returns `true` when the legacy service is consulted after the primary.
    ///
    /// A legacy primary never falls back to itself.
    #[must_use]
    pub const fn uses_legacy_fallback(&self) -> bool {
        matches!(self.fallback, FallbackProvider::Legacy)
            && !matches!(self.primary, PrimaryProvider::Legacy)
    }
}

impl Default for AuthStrategy {
    fn default() -> Self {
        Self::new(PrimaryProvider::Oidc, FallbackProvider::Legacy)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Upstream systems
// ═══════════════════════════════════════════════════════════════════════

/// First-party OIDC provider (Authentik).
#[derive(Clone, PartialEq, Eq)]
pub struct OidcConfig {
    /// Issuer base URL (e.g. `https://sso.example.com`).
    pub issuer: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret. Without it the password grant cannot run.
    pub client_secret: Option<String>,

    /// Group whose members get the admin role.
    pub admin_group: String,

    /// Requested scopes (space separated).
    pub scopes: String,
}

impl OidcConfig {
    /// Create OIDC configuration.
    #[must_use]
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            client_secret: None,
            admin_group: DEFAULT_ADMIN_GROUP.to_string(),
            scopes: OIDC_SCOPES.to_string(),
        }
    }

    /// Set the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the admin group.
    #[must_use]
    pub fn with_admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = group.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/application/o/{path}/", self.issuer.trim_end_matches('/'))
    }

    /// Token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.endpoint("token")
    }

    /// Userinfo endpoint.
    #[must_use]
    pub fn userinfo_endpoint(&self) -> String {
        self.endpoint("userinfo")
    }

    /// Authorization endpoint.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        self.endpoint("authorize")
    }
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("admin_group", &self.admin_group)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Legacy auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAuthConfig {
    /// Service base URL.
    pub base_url: String,

    /// Platform identifier sent with each login.
    pub platform: String,
}

impl LegacyAuthConfig {
    /// Create legacy auth configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }

    /// Set the platform identifier.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Direct login endpoint.
    #[must_use]
    pub fn login_endpoint(&self) -> String {
        format!("{}/auth/sso/login", self.base_url.trim_end_matches('/'))
    }
}

/// Social-login registration endpoint on the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct SocialBridgeConfig {
    /// Gateway base URL.
    pub gateway_url: String,

    /// Shared secret proving the call comes from a portal.
    pub secret: Option<String>,

    /// Platform identifier.
    pub platform: String,
}

impl SocialBridgeConfig {
    /// Create bridge configuration.
    #[must_use]
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            secret: None,
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }

    /// Set the shared secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the platform identifier.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Registration endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/api/auth/social-login", self.gateway_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for SocialBridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialBridgeConfig")
            .field("gateway_url", &self.gateway_url)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("platform", &self.platform)
            .finish()
    }
}

/// OAuth client credentials for one social provider.
#[derive(Clone, PartialEq, Eq)]
pub struct SocialProviderConfig {
    /// Provider.
    pub provider: OAuthProvider,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Directory tenant (Microsoft only, default `common`).
    pub tenant: Option<String>,
}

impl SocialProviderConfig {
    /// Create provider credentials.
    #[must_use]
    pub fn new(
        provider: OAuthProvider,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant: None,
        }
    }

    /// Set the directory tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }
}

impl std::fmt::Debug for SocialProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialProviderConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session and redirects
// ═══════════════════════════════════════════════════════════════════════

/// Session token configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// HS256 signing secret.
    pub secret: String,

    /// Session lifetime in seconds.
    ///
    /// Default: 30 days
    pub max_age_secs: i64,

    /// Age after which a valid token is re-signed.
    ///
    /// Default: 24 hours
    pub update_age_secs: i64,

    /// Lifetime of the pending-SSO token.
    ///
    /// Default: 5 minutes
    pub sso_state_ttl_secs: i64,
}

impl SessionConfig {
    /// Create session configuration.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            max_age_secs: SESSION_MAX_AGE_SECS,
            update_age_secs: SESSION_UPDATE_AGE_SECS,
            sso_state_ttl_secs: SSO_STATE_TTL_SECS,
        }
    }

    /// Set session lifetime.
    #[must_use]
    pub const fn with_max_age(mut self, secs: i64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Set the refresh threshold.
    #[must_use]
    pub const fn with_update_age(mut self, secs: i64) -> Self {
        self.update_age_secs = secs;
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("max_age_secs", &self.max_age_secs)
            .field("update_age_secs", &self.update_age_secs)
            .field("sso_state_ttl_secs", &self.sso_state_ttl_secs)
            .finish()
    }
}

/// Post-authentication redirect configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    /// Application origin (e.g. `https://portal.example.com`).
    pub origin: String,

    /// Landing path for missing or rejected callbacks.
    pub default_landing: String,

    /// Admin application base URL; admins are always sent here.
    pub admin_app_url: Option<String>,
}

impl RedirectConfig {
    /// Create redirect configuration.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            default_landing: DEFAULT_LANDING_PATH.to_string(),
            admin_app_url: None,
        }
    }

    /// Set the default landing path.
    #[must_use]
    pub fn with_default_landing(mut self, path: impl Into<String>) -> Self {
        self.default_landing = path.into();
        self
    }

    /// Set the admin application URL.
    #[must_use]
    pub fn with_admin_app_url(mut self, url: impl Into<String>) -> Self {
        self.admin_app_url = Some(url.into());
        self
    }

    /// OAuth redirect URI registered for a provider.
    #[must_use]
    pub fn oauth_callback_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/api/auth/callback/{}", self.origin, provider.as_str())
    }

    /// Returns `true` when cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.origin.starts_with("https://")
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Aggregate
// ═══════════════════════════════════════════════════════════════════════

/// Complete sign-in configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Backend selection and policies.
    pub strategy: AuthStrategy,

    /// First-party OIDC provider (absent when not configured).
    pub oidc: Option<OidcConfig>,

    /// Legacy auth service.
    pub legacy: LegacyAuthConfig,

    /// Social-login registration.
    pub social_bridge: SocialBridgeConfig,

    /// Credentials of the enabled social providers.
    pub social_providers: Vec<SocialProviderConfig>,

    /// Session tokens.
    pub session: SessionConfig,

    /// Redirects.
    pub redirect: RedirectConfig,

    /// Bound on each upstream call.
    pub upstream_timeout: Duration,
}

const DEV_ORIGIN: &str = "http://localhost:3000";
const DEV_SECRET: &str = "development-session-secret-change-me";
const DEV_AUTH_SERVICE_URL: &str = "http://localhost:8001";
const DEV_GATEWAY_URL: &str = "http://localhost:8000";
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

impl AuthConfig {
    /// Configuration for local development and tests: localhost endpoints,
    /// default strategy, no OIDC client.
    #[must_use]
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            strategy: AuthStrategy::default(),
            oidc: None,
            legacy: LegacyAuthConfig::new(DEV_AUTH_SERVICE_URL),
            social_bridge: SocialBridgeConfig::new(DEV_GATEWAY_URL),
            social_providers: Vec::new(),
            session: SessionConfig::new(DEV_SECRET),
            redirect: RedirectConfig::new(DEV_ORIGIN),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }

    /// Set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the OIDC provider.
    #[must_use]
    pub fn with_oidc(mut self, oidc: OidcConfig) -> Self {
        self.oidc = Some(oidc);
        self
    }

    /// Set the redirect configuration.
    #[must_use]
    pub fn with_redirect(mut self, redirect: RedirectConfig) -> Self {
        self.redirect = redirect;
        self
    }

    /// Set the session configuration.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the upstream timeout.
    #[must_use]
    pub const fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Add social provider credentials.
    #[must_use]
    pub fn with_social_provider(mut self, provider: SocialProviderConfig) -> Self {
        self.social_providers.push(provider);
        self
    }

    /// Providers offered as browser-redirect sign-in: first-party SSO when
    /// OIDC is configured, then every social provider in the strategy that has
    /// credentials.
    #[must_use]
    pub fn enabled_sso_providers(&self) -> Vec<OAuthProvider> {
        let mut providers = Vec::new();
        if self.oidc.is_some() {
            providers.push(OAuthProvider::Authentik);
        }
        providers.extend(
            self.strategy
                .social_providers
                .iter()
                .copied()
                .filter(|p| self.social_providers.iter().any(|c| c.provider == *p)),
        );
        providers
    }

    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is invalid, or, in production,
    /// when a required URL or secret is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`AuthConfig::from_env`].
    #[allow(clippy::too_many_lines)] // Config loading is naturally long but simple
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = Environment::parse(get("APP_ENV"))?;
        let production = environment == Environment::Production;

        let required = |key: &'static str, dev_default: &str| -> Result<String, ConfigError> {
            match get(key) {
                Some(value) => Ok(value),
                None if production => Err(ConfigError::Missing(key)),
                None => Ok(dev_default.to_string()),
            }
        };

        // Strategy
        let primary = match get("AUTH_PRIMARY").as_deref() {
            None | Some("oidc") => PrimaryProvider::Oidc,
            Some("legacy") => PrimaryProvider::Legacy,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "AUTH_PRIMARY",
                    reason: format!("expected 'oidc' or 'legacy', got '{other}'"),
                });
            }
        };
        let fallback = match get("AUTH_FALLBACK").as_deref() {
            None | Some("legacy") => FallbackProvider::Legacy,
            Some("none") => FallbackProvider::None,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "AUTH_FALLBACK",
                    reason: format!("expected 'legacy' or 'none', got '{other}'"),
                });
            }
        };
        let social_failure_policy = match get("AUTH_SOCIAL_FAILURE_POLICY").as_deref() {
            None | Some("reject") => SocialFailurePolicy::Reject,
            Some("degrade") => SocialFailurePolicy::Degrade,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "AUTH_SOCIAL_FAILURE_POLICY",
                    reason: format!("expected 'reject' or 'degrade', got '{other}'"),
                });
            }
        };
        let social_providers = match get("AUTH_SOCIAL_PROVIDERS") {
            None => Vec::new(),
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|name| {
                    name.parse::<OAuthProvider>()
                        .ok()
                        .filter(|p| !p.is_first_party())
                        .ok_or_else(|| ConfigError::Invalid {
                            var: "AUTH_SOCIAL_PROVIDERS",
                            reason: format!("unknown social provider '{name}'"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        let strategy = AuthStrategy {
            primary,
            fallback,
            social_providers,
            social_failure_policy,
        };

        // Redirects
        let origin = required("AUTH_URL", DEV_ORIGIN)?;
        validate_url("AUTH_URL", &origin)?;
        let mut redirect = RedirectConfig::new(origin);
        if let Some(landing) = get("AUTH_DEFAULT_LANDING") {
            if !landing.starts_with('/') || landing.starts_with("//") {
                return Err(ConfigError::Invalid {
                    var: "AUTH_DEFAULT_LANDING",
                    reason: "must be an absolute path".to_string(),
                });
            }
            redirect = redirect.with_default_landing(landing);
        }
        if let Some(admin_url) = get("ADMIN_APP_URL") {
            validate_url("ADMIN_APP_URL", &admin_url)?;
            redirect = redirect.with_admin_app_url(admin_url.trim_end_matches('/'));
        }

        // Session
        let secret = required("AUTH_SECRET", DEV_SECRET)?;
        if production && secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "AUTH_SECRET",
                reason: format!("must be at least {MIN_PRODUCTION_SECRET_LEN} bytes"),
            });
        }
        let mut session = SessionConfig::new(secret);
        if let Some(max_age) = parse_positive(&get, "SESSION_MAX_AGE_SECS", MAX_SESSION_AGE_SECS)? {
            session = session.with_max_age(max_age);
        }
        if let Some(update_age) = parse_positive(&get, "SESSION_UPDATE_AGE_SECS", MAX_SESSION_AGE_SECS)? {
            session = session.with_update_age(update_age);
        }

        let platform = get("AUTH_PLATFORM").unwrap_or_else(|| DEFAULT_PLATFORM.to_string());

        // OIDC
        let oidc = match (get("AUTHENTIK_ISSUER"), get("AUTHENTIK_CLIENT_ID")) {
            (Some(issuer), Some(client_id)) => {
                validate_url("AUTHENTIK_ISSUER", &issuer)?;
                let mut oidc = OidcConfig::new(issuer, client_id);
                if let Some(secret) = get("AUTHENTIK_CLIENT_SECRET") {
                    oidc = oidc.with_client_secret(secret);
                }
                if let Some(group) = get("AUTHENTIK_ADMIN_GROUP") {
                    oidc = oidc.with_admin_group(group);
                }
                Some(oidc)
            }
            (None, _) if production && primary == PrimaryProvider::Oidc => {
                return Err(ConfigError::Missing("AUTHENTIK_ISSUER"));
            }
            (_, None) if production && primary == PrimaryProvider::Oidc => {
                return Err(ConfigError::Missing("AUTHENTIK_CLIENT_ID"));
            }
            _ => None,
        };
        if production
            && primary == PrimaryProvider::Oidc
            && oidc.as_ref().is_some_and(|o| o.client_secret.is_none())
        {
            return Err(ConfigError::Missing("AUTHENTIK_CLIENT_SECRET"));
        }

        // Legacy
        let needs_legacy = primary == PrimaryProvider::Legacy || strategy.uses_legacy_fallback();
        let legacy_url = match get("AUTH_SERVICE_URL") {
            Some(url) => url,
            None if production && needs_legacy => return Err(ConfigError::Missing("AUTH_SERVICE_URL")),
            None => DEV_AUTH_SERVICE_URL.to_string(),
        };
        validate_url("AUTH_SERVICE_URL", &legacy_url)?;
        let legacy = LegacyAuthConfig::new(legacy_url).with_platform(platform.clone());

        // Social
        let needs_bridge = !strategy.social_providers.is_empty();
        let gateway_url = match get("BRAIN_GATEWAY_URL") {
            Some(url) => url,
            None if production && needs_bridge => return Err(ConfigError::Missing("BRAIN_GATEWAY_URL")),
            None => DEV_GATEWAY_URL.to_string(),
        };
        validate_url("BRAIN_GATEWAY_URL", &gateway_url)?;
        let mut social_bridge = SocialBridgeConfig::new(gateway_url).with_platform(platform);
        match get("SOCIAL_LOGIN_SECRET") {
            Some(secret) => social_bridge = social_bridge.with_secret(secret),
            None if production && needs_bridge => return Err(ConfigError::Missing("SOCIAL_LOGIN_SECRET")),
            None => {}
        }

        let mut provider_credentials = Vec::new();
        for provider in &strategy.social_providers {
            let (id_var, secret_var) = match provider {
                OAuthProvider::Google => ("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
                OAuthProvider::GitHub => ("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
                OAuthProvider::Microsoft => ("MICROSOFT_CLIENT_ID", "MICROSOFT_CLIENT_SECRET"),
                OAuthProvider::Authentik => continue,
            };
            match (get(id_var), get(secret_var)) {
                (Some(id), Some(secret)) => {
                    let mut credentials = SocialProviderConfig::new(*provider, id, secret);
                    if *provider == OAuthProvider::Microsoft {
                        credentials = credentials
                            .with_tenant(get("MICROSOFT_TENANT_ID").unwrap_or_else(|| "common".to_string()));
                    }
                    provider_credentials.push(credentials);
                }
                (None, _) if production => return Err(ConfigError::Missing(id_var)),
                (_, None) if production => return Err(ConfigError::Missing(secret_var)),
                _ => {}
            }
        }

        let upstream_timeout = parse_positive(&get, "AUTH_UPSTREAM_TIMEOUT_SECS", i64::MAX)?
            .and_then(|secs| u64::try_from(secs).ok())
            .map_or(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS), Duration::from_secs);

        Ok(Self {
            environment,
            strategy,
            oidc,
            legacy,
            social_bridge,
            social_providers: provider_credentials,
            session,
            redirect,
            upstream_timeout,
        })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_positive<G>(get: &G, var: &'static str, max: i64) -> Result<Option<i64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|raw| {
            raw.parse::<i64>()
                .ok()
                .filter(|v| (1..=max).contains(v))
                .ok_or_else(|| ConfigError::Invalid {
                    var,
                    reason: format!("expected an integer between 1 and {max}, got '{raw}'"),
                })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_development_defaults() {
        let config = AuthConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.redirect.origin, "http://localhost:3000");
        assert_eq!(config.redirect.default_landing, "/dashboard");
        assert_eq!(config.strategy, AuthStrategy::default());
        assert!(config.oidc.is_none());
        assert_eq!(config.legacy.login_endpoint(), "http://localhost:8001/auth/sso/login");
        assert_eq!(config.upstream_timeout, Duration::from_secs(8));
        assert_eq!(config.session.max_age_secs, 2_592_000);
    }

    #[test]
    fn test_production_requires_secret() {
        let result = AuthConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("AUTH_URL", "https://portal.example.com"),
            ("AUTH_PRIMARY", "legacy"),
            ("AUTH_SERVICE_URL", "https://auth.example.com"),
        ]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("AUTH_SECRET"));
    }

    #[test]
    fn test_production_requires_oidc_for_oidc_primary() {
        let result = AuthConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("AUTH_URL", "https://portal.example.com"),
            ("AUTH_SECRET", "0123456789abcdef0123456789abcdef"),
            ("AUTH_SERVICE_URL", "https://auth.example.com"),
        ]));

        assert_eq!(result.unwrap_err(), ConfigError::Missing("AUTHENTIK_ISSUER"));
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let result = AuthConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("AUTH_URL", "https://portal.example.com"),
            ("AUTH_SECRET", "short"),
        ]));

        assert!(matches!(result, Err(ConfigError::Invalid { var: "AUTH_SECRET", .. })));
    }

    #[test]
    fn test_full_production_config() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("AUTH_URL", "https://portal.example.com/"),
            ("AUTH_SECRET", "0123456789abcdef0123456789abcdef"),
            ("ADMIN_APP_URL", "https://admin.example.com/"),
            ("AUTHENTIK_ISSUER", "https://sso.example.com"),
            ("AUTHENTIK_CLIENT_ID", "portal"),
            ("AUTHENTIK_CLIENT_SECRET", "s3cret"),
            ("AUTH_SERVICE_URL", "https://auth.example.com"),
            ("BRAIN_GATEWAY_URL", "https://gateway.example.com"),
            ("SOCIAL_LOGIN_SECRET", "bridge"),
            ("AUTH_SOCIAL_PROVIDERS", "google, github"),
            ("AUTH_SOCIAL_FAILURE_POLICY", "degrade"),
            ("GOOGLE_CLIENT_ID", "g-id"),
            ("GOOGLE_CLIENT_SECRET", "g-secret"),
            ("GITHUB_CLIENT_ID", "gh-id"),
            ("GITHUB_CLIENT_SECRET", "gh-secret"),
            ("AUTH_UPSTREAM_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.redirect.origin, "https://portal.example.com");
        assert_eq!(config.redirect.admin_app_url.as_deref(), Some("https://admin.example.com"));
        assert!(config.redirect.is_secure());
        assert_eq!(config.strategy.social_failure_policy, SocialFailurePolicy::Degrade);
        assert_eq!(
            config.enabled_sso_providers(),
            vec![OAuthProvider::Authentik, OAuthProvider::Google, OAuthProvider::GitHub]
        );
        let oidc = config.oidc.unwrap();
        assert_eq!(oidc.token_endpoint(), "https://sso.example.com/application/o/token/");
        assert_eq!(oidc.admin_group, "authentik Admins");
        assert_eq!(
            config.social_bridge.endpoint(),
            "https://gateway.example.com/api/auth/social-login"
        );
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[("AUTH_PRIMARY", "ldap")])),
            Err(ConfigError::Invalid { var: "AUTH_PRIMARY", .. })
        ));
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[("AUTH_URL", "javascript:alert(1)")])),
            Err(ConfigError::InvalidUrl { var: "AUTH_URL", .. })
        ));
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[("AUTH_SOCIAL_PROVIDERS", "authentik")])),
            Err(ConfigError::Invalid { var: "AUTH_SOCIAL_PROVIDERS", .. })
        ));
        assert!(matches!(
            AuthConfig::from_lookup(lookup(&[("AUTH_UPSTREAM_TIMEOUT_SECS", "0")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_session_ages_are_capped() {
        for var in ["SESSION_MAX_AGE_SECS", "SESSION_UPDATE_AGE_SECS"] {
            assert!(
                matches!(
                    AuthConfig::from_lookup(lookup(&[(var, "1000000000000000")])),
                    Err(ConfigError::Invalid { var: v, .. }) if v == var
                ),
                "{var}"
            );
        }

        let config = AuthConfig::from_lookup(lookup(&[(
            "SESSION_MAX_AGE_SECS",
            &MAX_SESSION_AGE_SECS.to_string(),
        )]))
        .unwrap();
        assert_eq!(config.session.max_age_secs, MAX_SESSION_AGE_SECS);
    }

    #[test]
    fn test_legacy_primary_never_falls_back_to_itself() {
        let strategy = AuthStrategy::new(PrimaryProvider::Legacy, FallbackProvider::Legacy);
        assert!(!strategy.uses_legacy_fallback());
        assert!(AuthStrategy::default().uses_legacy_fallback());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let config = AuthConfig::development()
            .with_oidc(OidcConfig::new("https://sso.example.com", "portal").with_client_secret("top"));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top\""));
        assert!(!rendered.contains(DEV_SECRET));
    }

    #[test]
    fn test_redirect_config_builder() {
        let redirect = RedirectConfig::new("https://portal.example.com/")
            .with_default_landing("/home")
            .with_admin_app_url("https://admin.example.com");

        assert_eq!(redirect.origin, "https://portal.example.com");
        assert_eq!(redirect.default_landing, "/home");
        assert_eq!(
            redirect.oauth_callback_uri(OAuthProvider::Google),
            "https://portal.example.com/api/auth/callback/google"
        );
    }
}
