//! Proxy state shared across request handlers

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::store::SignatureStore;

/// Shared state for the proxy server
#[derive(Clone)]
pub struct ProxyState {
    /// HTTP client for forwarding requests
    pub(super) client: reqwest::Client,
    /// Upstream base URL (scheme + host, no trailing slash)
    pub(super) upstream_url: String,
    /// Signature cache threading thought signatures between turns.
    /// Constructed once at startup and injected here - never a global.
    pub(super) store: Arc<SignatureStore>,
    /// Hard ceiling on one upstream attempt (buffered) or response head
    /// (streaming)
    pub(super) request_timeout: Duration,
    /// Ceiling on the gap between body chunks
    pub(super) idle_timeout: Duration,
}

impl ProxyState {
    pub fn new(config: &Config, client: reqwest::Client, store: Arc<SignatureStore>) -> Self {
        Self {
            client,
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            store,
            request_timeout: config.request_timeout,
            idle_timeout: config.idle_timeout,
        }
    }
}
