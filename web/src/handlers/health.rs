//! Health check endpoint.

use axum::http::StatusCode;

/// Liveness probe for load balancers.
///
/// Does not call the upstream identity systems.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
