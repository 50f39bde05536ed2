// Main proxy handler - the request lifecycle
//
// One inbound request flows through: store sweep -> conversation keying
// -> body rewrite (schema sanitization + signature injection) -> retried
// upstream attempts -> streaming or buffered response emission. All
// recoverable conditions (unparseable bodies, missing signatures) are
// handled inline without interrupting the pipeline; only transport
// exhaustion surfaces as a proxy error.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
};
use bytes::Bytes;

use super::{buffered, streaming};
use crate::proxy::error::ProxyError;
use crate::proxy::retry::send_with_retries;
use crate::proxy::rewrite::{is_streaming_request, rewrite_request_body};
use crate::proxy::state::ProxyState;
use crate::proxy::upstream::{buffered_attempt, streaming_attempt, UpstreamRequest};
use crate::store::derive_conversation_key;

/// Header carrying an explicit caller-chosen conversation identifier.
const SESSION_HEADER: &str = "x-session-id";

/// Main proxy handler - rewrites and forwards all requests
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Result<Response<Body>, ProxyError> {
    let started = Instant::now();

    // Opportunistic expiry: the proxy is request-driven, so sweeping here
    // instead of on a timer keeps behavior deterministic and bounds
    // memory without a background task.
    state.store.sweep(started);
    tracing::trace!(
        conversations = state.store.conversation_count(),
        "signature store swept"
    );

    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty());
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
    let conversation = derive_conversation_key(session_id, Some(peer), user_agent);

    tracing::debug!(
        %method,
        path = uri.path(),
        conversation = %conversation,
        "proxying request"
    );

    let body_bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|e| ProxyError::BodyRead(e.to_string()))?;

    // Rewrite falls open: a body the proxy cannot parse is forwarded
    // verbatim rather than rejected locally.
    let forward_body = match rewrite_request_body(&body_bytes, &state.store, &conversation) {
        Some(rewritten) => Bytes::from(rewritten),
        None => body_bytes,
    };
    let wants_stream = is_streaming_request(&forward_body);

    let forward_url = match uri.query() {
        Some(query) => format!("{}{}?{}", state.upstream_url, uri.path(), query),
        None => format!("{}{}", state.upstream_url, uri.path()),
    };
    let upstream_request = UpstreamRequest {
        method,
        url: forward_url,
        headers,
        body: forward_body,
    };

    if wants_stream {
        let response = send_with_retries(|| {
            streaming_attempt(&state.client, &upstream_request, state.request_timeout)
        })
        .await
        .map_err(ProxyError::Upstream)?;

        streaming::emit(&state, &conversation, response, started).await
    } else {
        let response = send_with_retries(|| {
            buffered_attempt(
                &state.client,
                &upstream_request,
                state.request_timeout,
                state.idle_timeout,
            )
        })
        .await
        .map_err(ProxyError::Upstream)?;

        buffered::emit(&state, &conversation, response, started)
    }
}
