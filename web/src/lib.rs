//! Axum routes for the portal sign-in flow.
//!
//! This crate is the imperative shell around [`portal_auth`]: it parses
//! browser requests, runs one sign-in attempt through the flow, and maps the
//! finished state onto cookies and redirects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Imperative Shell (Axum)        │  ← forms, cookies, redirects
//! │  - CSRF check, cookie parsing           │  ← correlation ids, tracing
//! ├─────────────────────────────────────────┤
//! │          portal_auth                    │
//! │  - SignInReducer (pure transitions)     │
//! │  - SignInFlow (effects → upstreams)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at a handler
//! 2. **Extract** form, query and cookies
//! 3. **Run** the attempt through [`portal_auth::SignInFlow`]
//! 4. **Map** the final state to `Set-Cookie` headers and a redirect
//!
//! # Example
//!
//! ```ignore
//! let flow = HttpSignInFlow::from_config(&config, &http_client);
//! let app = portal_web::router(AppState::new(flow));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cookies;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use cookies::{CookieSettings, CSRF_COOKIE, PENDING_SSO_COOKIE, SESSION_COOKIE};
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, UserAgent};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER};
pub use router::router;
pub use state::{AppState, HttpAppState};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
