//! Error types for the sign-in flow.

use thiserror::Error;

/// Result type alias for sign-in operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the sign-in flow.
///
/// Upstream failures are normally absorbed at component boundaries and turned
/// into "no identity"; the variants below are what remains visible to callers
/// and logs. Only [`AuthError::user_message`] may be shown to an end user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// A required credential field was empty.
    #[error("Missing credential field: {field}")]
    MissingCredential {
        /// Name of the empty field (`email` or `password`).
        field: &'static str,
    },

    // ═══════════════════════════════════════════════════════════
    // Authentication failures
    // ═══════════════════════════════════════════════════════════

    /// No identity could be established.
    #[error("Invalid credentials")]
    AuthenticationFailed,

    /// An upstream identity system could not be reached (or timed out).
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream identity system answered with a non-success status.
    #[error("Upstream rejected request with status {status}")]
    UpstreamRejected {
        /// HTTP status code returned by the upstream.
        status: u16,
    },

    /// An upstream response could not be parsed.
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// A required secret or endpoint is not configured.
    #[error("Configuration gap: {0}")]
    ConfigurationGap(String),

    // ═══════════════════════════════════════════════════════════
    // SSO
    // ═══════════════════════════════════════════════════════════

    /// The provider is unknown or not enabled.
    #[error("Invalid OAuth provider")]
    InvalidOAuthProvider,

    /// OAuth state parameter is missing, expired or does not match (CSRF).
    #[error("Invalid OAuth state parameter")]
    OAuthStateInvalid,

    /// The provider refused the authorization code.
    #[error("Invalid OAuth authorization code")]
    OAuthCodeInvalid,

    // ═══════════════════════════════════════════════════════════
    // Session
    // ═══════════════════════════════════════════════════════════

    /// The session token signature or structure is invalid.
    #[error("Invalid session token")]
    InvalidSessionToken,

    /// The session token has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Signing a token failed.
    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Internal error (never exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns `true` if this error is due to invalid user input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use portal_auth::AuthError;
    /// assert!(AuthError::MissingCredential { field: "email" }.is_user_error());
    /// assert!(!AuthError::Internal("boom".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::AuthenticationFailed
                | Self::OAuthCodeInvalid
                | Self::OAuthStateInvalid
                | Self::InvalidOAuthProvider
        )
    }

    /// Returns `true` if this error indicates a security issue.
    ///
    /// # Examples
    ///
    /// ```
    /// # use portal_auth::AuthError;
    /// assert!(AuthError::OAuthStateInvalid.is_security_issue());
    /// assert!(!AuthError::SessionExpired.is_security_issue());
    /// ```
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(self, Self::OAuthStateInvalid | Self::InvalidSessionToken)
    }

    /// Message safe to show to an end user.
    ///
    /// Every authentication failure collapses to the same text so the
    /// response never reveals which backend was tried or whether the account
    /// exists.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "Email and password are required",
            Self::OAuthStateInvalid | Self::OAuthCodeInvalid | Self::InvalidOAuthProvider => {
                "Single sign-on failed, please try again"
            }
            Self::InvalidSessionToken | Self::SessionExpired => "Your session has ended, please sign in again",
            _ => "Invalid credentials",
        }
    }

    /// Short machine-readable code used in `/login?error=` redirects.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "MissingCredentials",
            Self::OAuthStateInvalid | Self::OAuthCodeInvalid | Self::InvalidOAuthProvider => {
                "OAuthCallback"
            }
            Self::InvalidSessionToken | Self::SessionExpired => "SessionRequired",
            _ => "CredentialsSignin",
        }
    }

    /// User-facing message for a code produced by [`AuthError::error_code`].
    ///
    /// Unknown codes (the query string is attacker-controlled) get the
    /// generic message.
    ///
    /// # Examples
    ///
    /// ```
    /// # use portal_auth::AuthError;
    /// assert_eq!(AuthError::message_for_code("OAuthCallback"), AuthError::OAuthStateInvalid.user_message());
    /// assert_eq!(AuthError::message_for_code("<script>"), "Invalid credentials");
    /// ```
    #[must_use]
    pub fn message_for_code(code: &str) -> &'static str {
        match code {
            "MissingCredentials" => Self::MissingCredential { field: "email" }.user_message(),
            "OAuthCallback" => Self::OAuthStateInvalid.user_message(),
            "SessionRequired" => Self::SessionExpired.user_message(),
            _ => Self::AuthenticationFailed.user_message(),
        }
    }
}
