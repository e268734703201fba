//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use portal_auth::AuthError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Browser flows answer failures with redirects to the login page; this type
/// covers the JSON endpoints and the requests that cannot be redirected
/// (bad CSRF token, unknown route parameters).
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    /// Safe to show to the user.
    message: String,
    code: String,
    /// Logged, never sent.
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error for the logs.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), code.into())
    }

    /// Create a 403 Forbidden error for a missing or mismatched CSRF token.
    #[must_use]
    pub fn csrf_mismatch() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "Invalid CSRF token".to_string(),
            "MissingCSRF".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message.into(), code.into())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into(), "NOT_FOUND".to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// `{code, message}` body of every error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            let source = self.source.as_ref().map(|e| format!("{e:#}"));
            tracing::error!(status = %self.status, code = %self.code, source = ?source, "{}", self.message);
        }

        (
            self.status,
            Json(ErrorResponse {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

/// Map sign-in errors onto HTTP responses.
///
/// Upstream details never reach the client: every authentication failure
/// carries the same generic message.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.user_message();
        let code = err.error_code();
        if matches!(err, AuthError::TokenSigning(_) | AuthError::Internal(_)) {
            return Self::internal("An internal error occurred").with_source(anyhow::Error::new(err));
        }
        match err {
            AuthError::MissingCredential { .. } => Self::validation(message, code),
            AuthError::InvalidOAuthProvider => Self::not_found("Unknown sign-in provider"),
            _ => Self::unauthorized(message, code),
        }
    }
}
