//! Route table.

use crate::handlers::{auth, health_check, login_page};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use portal_auth::constants::LOGIN_PATH;
use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use portal_auth::providers::{CredentialBackend, OAuth2Provider, SocialRegistry};
use tower_http::trace::TraceLayer;

/// Build the sign-in router.
///
/// The correlation-id layer is outermost so the `TraceLayer` span and every
/// handler log line carry the request's id.
pub fn router<P, F, O, R>(state: AppState<P, F, O, R>) -> Router
where
    P: CredentialBackend + 'static,
    F: CredentialBackend + 'static,
    O: OAuth2Provider + 'static,
    R: SocialRegistry + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route(LOGIN_PATH, get(login_page::<P, F, O, R>))
        .route("/api/auth/csrf", get(auth::csrf::<P, F, O, R>))
        .route("/api/auth/providers", get(auth::providers::<P, F, O, R>))
        .route("/api/auth/session", get(auth::session::<P, F, O, R>))
        .route("/api/auth/signout", post(auth::signout::<P, F, O, R>))
        .route(
            "/api/auth/callback/credentials",
            post(auth::credentials_callback::<P, F, O, R>),
        )
        .route("/api/auth/signin/:provider", get(auth::sso_signin::<P, F, O, R>))
        .route("/api/auth/callback/:provider", get(auth::sso_callback::<P, F, O, R>))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            // Path only: callback queries carry authorization codes.
            tracing::debug_span!("request", method = %request.method(), path = %request.uri().path())
        }))
        .layer(correlation_id_layer())
        .with_state(state)
}
