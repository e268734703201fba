//! Portal sign-in HTTP server.
//!
//! Serves the sign-in routes for the portal frontends: credential sign-in,
//! SSO redirects and callbacks, session reads and sign-out.

mod config;

use anyhow::Context;
use config::ServerConfig;
use portal_auth::{AuthConfig, HttpSignInFlow};
use portal_web::{router, AppState};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is not an error.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "portal_server=info,portal_web=info,portal_auth=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let config = AuthConfig::from_env().context("Invalid sign-in configuration")?;
    let server = ServerConfig::from_env().context("Invalid server configuration")?;
    info!(
        environment = ?config.environment,
        origin = %config.redirect.origin,
        oidc = config.oidc.is_some(),
        sso_providers = ?config.enabled_sso_providers(),
        "Configuration loaded"
    );

    // Socket-level cap; the flow bounds each upstream call separately.
    let http_client = reqwest::Client::builder()
        .timeout(config.upstream_timeout + Duration::from_secs(1))
        .build()
        .context("Failed to build HTTP client")?;

    let flow = HttpSignInFlow::from_config(&config, &http_client);
    let app = router(AppState::new(flow));

    let addr = server.address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
