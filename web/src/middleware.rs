//! Correlation-id middleware.
//!
//! Every request gets an id: the caller's `X-Correlation-ID` when it is a
//! valid UUID, a fresh v4 otherwise. The id is stored in the request
//! extensions, recorded on an `http_request` span wrapping the handler, and
//! echoed in the response header so a browser report can be matched to the
//! sign-in logs.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/api/auth/session", get(session))
//!     .layer(correlation_id_layer());
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Layer assigning a correlation id to every request.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Service produced by [`CorrelationIdLayer`].
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let id = incoming_id(req.headers()).unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %id,
            method = %req.method(),
            path = %req.uri().path(),
        );
        let response = self.inner.call(req).instrument(span);

        Box::pin(async move {
            let mut response = response.await?;
            if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

fn incoming_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Read the correlation ID stored by the middleware.
pub trait CorrelationIdExt {
    /// Correlation ID of this request, or `None` when the middleware is not
    /// installed.
    fn correlation_id(&self) -> Option<Uuid>;
}

impl<B> CorrelationIdExt for axum::http::Request<B> {
    fn correlation_id(&self) -> Option<Uuid> {
        self.extensions().get::<Uuid>().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    /// Echoes the id the handler sees, so tests can compare it to the header.
    fn app() -> Router {
        async fn echo(req: Request) -> String {
            req.correlation_id().map_or_else(String::new, |id| id.to_string())
        }
        Router::new().route("/echo", get(echo)).layer(correlation_id_layer())
    }

    async fn call(header: Option<&str>) -> (String, String) {
        let mut builder = axum::http::Request::builder().uri("/echo");
        if let Some(value) = header {
            builder = builder.header(CORRELATION_ID_HEADER, value);
        }
        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let echoed = response.headers()[CORRELATION_ID_HEADER].to_str().unwrap().to_string();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (echoed, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_caller_id_is_kept() {
        let sent = Uuid::new_v4().to_string();
        let (echoed, seen_by_handler) = call(Some(&sent)).await;
        assert_eq!(echoed, sent);
        assert_eq!(seen_by_handler, sent);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_id_is_replaced() {
        for header in [None, Some("not-a-uuid"), Some("")] {
            let (echoed, seen_by_handler) = call(header).await;
            assert!(Uuid::parse_str(&echoed).is_ok(), "{header:?}");
            assert_eq!(echoed, seen_by_handler);
        }
    }

    #[test]
    fn test_request_without_middleware_has_no_id() {
        let req = axum::http::Request::builder().body(()).unwrap();
        assert_eq!(req.correlation_id(), None);
    }
}
