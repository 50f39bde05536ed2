//! Proxy server setup and initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::any, Router};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::store::SignatureStore;

use super::proxy_handler;
use super::state::ProxyState;

/// Start the proxy server
pub async fn start_proxy(config: Config, store: Arc<SignatureStore>) -> Result<()> {
    let bind_addr = config.bind_addr;

    // Build the HTTP client with connection pooling. No overall client
    // timeout: per-attempt deadlines are enforced in the retry layer,
    // and streaming bodies legitimately outlive any response-head
    // timeout.
    // NOTE: No default User-Agent - the client's own User-Agent is
    // forwarded, and it also feeds conversation keying.
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        // Force HTTP/1.1 to avoid HTTP/2 connection reset issues with some providers
        .http1_only()
        .build()
        .context("Failed to create HTTP client")?;

    let state = ProxyState::new(&config, client, store);

    // All requests go to the proxy handler, whatever the method or path
    let app = Router::new()
        .route("/", any(proxy_handler))
        .route("/*path", any(proxy_handler))
        .with_state(state);

    tracing::info!("Starting proxy on {}", bind_addr);
    tracing::info!("Forwarding to {}", config.upstream_url);

    let listener = TcpListener::bind(bind_addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Proxy listening on {}", bind_addr);

    // Peer addresses feed auto conversation keying, so the service is
    // built with connect info.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    })
    .await
    .context("Server error")?;

    tracing::info!("Proxy server shut down gracefully");
    Ok(())
}
