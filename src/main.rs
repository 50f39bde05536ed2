// gembridge - OpenAI-compatible reverse proxy for Gemini
//
// This tool sits between an OpenAI-compatible client and Gemini's
// OpenAI-compatibility endpoint, which is stricter than the clients
// expect in two ways: tool schemas must use a restricted JSON-Schema
// dialect, and opaque per-tool-call "thought signatures" from one turn
// must be echoed back on the next.
//
// Architecture:
// - Proxy server (axum): Intercepts HTTP traffic and forwards upstream
// - Schema sanitizer: Rewrites tool schemas into the accepted dialect
// - Signature store: Per-conversation TTL cache threading signatures
//   between turns, fed by streaming deltas or buffered responses
// - Retry orchestrator: Per-failure-class backoff around upstream calls

mod cli;
mod config;
mod proxy;
mod schema;
mod store;

use std::sync::Arc;

use anyhow::Result;
use store::SignatureStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Subcommands (config management) handle themselves and exit
    let Some(config) = cli::handle_cli() else {
        return Ok(());
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gembridge=info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!(
        "gembridge {} starting at {}",
        config::VERSION,
        chrono::Utc::now().to_rfc3339()
    );

    // The signature store is built here and injected into the proxy so
    // its lifecycle is explicit and tests can construct their own.
    let store = Arc::new(SignatureStore::new());

    proxy::start_proxy(config, store).await
}
