//! Request metadata extractors.
//!
//! The sign-in handlers attach these to their log lines; none of them can
//! reject a request.
//!
//! ```ignore
//! async fn sign_in(correlation_id: CorrelationId, client_ip: ClientIp, /* ... */) {
//!     tracing::debug!(correlation_id = %correlation_id.0, client_ip = %client_ip.0, "Credentials submitted");
//! }
//! ```

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

const FORWARDED_FOR: &str = "X-Forwarded-For";
const REAL_IP: &str = "X-Real-IP";
const UNKNOWN_AGENT: &str = "Unknown";

/// Correlation id of the current request.
///
/// The id stored by [`crate::middleware::correlation_id_layer`] wins; without
/// the middleware a valid `X-Correlation-ID` header is used, and a fresh id
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = match parts.extensions.get::<Uuid>() {
            Some(id) => *id,
            None => header_str(&parts.headers, CORRELATION_ID_HEADER)
                .and_then(|value| Uuid::parse_str(value).ok())
                .unwrap_or_else(Uuid::new_v4),
        };
        Ok(Self(id))
    }
}

/// Client address.
///
/// Resolution order: first `X-Forwarded-For` entry, `X-Real-IP`, the socket
/// address (when served with `into_make_service_with_connect_info`),
/// loopback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded: Option<IpAddr> = header_str(&parts.headers, FORWARDED_FOR)
            .and_then(|list| list.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        let real_ip = || header_str(&parts.headers, REAL_IP).and_then(|ip| ip.trim().parse::<IpAddr>().ok());
        let socket = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        };

        let ip = forwarded
            .or_else(real_ip)
            .or_else(socket)
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        Ok(Self(ip))
    }
}

/// `User-Agent` header, or `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNKNOWN_AGENT);
        Ok(Self(agent.to_string()))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn client_ip(headers: &[(&str, &str)]) -> String {
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts(headers), &()).await.unwrap();
        ip.to_string()
    }

    #[tokio::test]
    async fn test_correlation_id_sources() {
        let sent = Uuid::new_v4();
        let CorrelationId(from_header) =
            CorrelationId::from_request_parts(&mut parts(&[(CORRELATION_ID_HEADER, &sent.to_string())]), &())
                .await
                .unwrap();
        assert_eq!(from_header, sent);

        let assigned = Uuid::new_v4();
        let mut with_extension = parts(&[(CORRELATION_ID_HEADER, &sent.to_string())]);
        with_extension.extensions.insert(assigned);
        let CorrelationId(from_extension) = CorrelationId::from_request_parts(&mut with_extension, &())
            .await
            .unwrap();
        assert_eq!(from_extension, assigned);

        let CorrelationId(generated) =
            CorrelationId::from_request_parts(&mut parts(&[(CORRELATION_ID_HEADER, "nope")]), &())
                .await
                .unwrap();
        assert_ne!(generated, Uuid::nil());
    }

    #[tokio::test]
    async fn test_client_ip_resolution_order() {
        assert_eq!(
            client_ip(&[(FORWARDED_FOR, "203.0.113.1, 10.0.0.2"), (REAL_IP, "198.51.100.42")]).await,
            "203.0.113.1"
        );
        assert_eq!(client_ip(&[(FORWARDED_FOR, "garbage"), (REAL_IP, "198.51.100.42")]).await, "198.51.100.42");
        assert_eq!(client_ip(&[]).await, "127.0.0.1");

        let mut with_socket = parts(&[]);
        with_socket
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 50_000))));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut with_socket, &()).await.unwrap();
        assert_eq!(ip.to_string(), "192.0.2.7");
    }

    #[tokio::test]
    async fn test_user_agent() {
        let UserAgent(agent) = UserAgent::from_request_parts(&mut parts(&[("user-agent", "curl/8.0")]), &())
            .await
            .unwrap();
        assert_eq!(agent, "curl/8.0");

        let UserAgent(missing) = UserAgent::from_request_parts(&mut parts(&[]), &()).await.unwrap();
        assert_eq!(missing, UNKNOWN_AGENT);
    }
}
