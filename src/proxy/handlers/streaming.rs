// Streaming (SSE) response handling
//
// Pass-through latency is the priority: status and headers go to the
// client the moment the upstream head arrives, and every body chunk is
// forwarded unmodified before anything else happens with it. The same
// ordered chunk sequence also feeds the SSE parser and the accumulator,
// which commit thought signatures to the store while the stream is
// still in flight - the next client turn may arrive before this stream
// ends.
//
// Once a single byte has been forwarded the response is unretractable,
// so any mid-stream failure (including idle or deadline timeouts) is
// terminal for the request: the stream just ends, and the client sees a
// truncated body. Signatures already committed stay committed.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::proxy::accumulator::StreamAccumulator;
use crate::proxy::error::ProxyError;
use crate::proxy::sse::SseLineParser;
use crate::proxy::state::ProxyState;
use crate::proxy::translate::translate_error_body;

/// Emit a streaming upstream response to the client.
pub(super) async fn emit(
    state: &ProxyState,
    conversation: &str,
    upstream: reqwest::Response,
    started: Instant,
) -> Result<Response<Body>, ProxyError> {
    let status = upstream.status();

    // A final error outcome never streamed anything to the client, so it
    // can be buffered and translated like the non-streaming path. The
    // head timeout only covered send(); reading the rejection body gets
    // its own deadline, and expiry falls back to an empty body rather
    // than holding the client open.
    if status.is_client_error() || status.is_server_error() {
        let headers = upstream.headers().clone();
        let body = match tokio::time::timeout(state.request_timeout, upstream.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) | Err(_) => Bytes::new(),
        };
        let translated = translate_error_body(&body);
        tracing::info!(
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "streaming request rejected upstream"
        );
        return build_response(status, &headers, Body::from(translated));
    }

    let response_headers = upstream.headers().clone();
    let store = Arc::clone(&state.store);
    let conversation = conversation.to_string();
    let idle_timeout = state.idle_timeout;
    let deadline = tokio::time::Instant::now() + state.request_timeout;

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(32);

    // The forwarding task owns the upstream body. If the client
    // disconnects, the receiver drops, sends start failing, and the task
    // winds down - aborting the upstream read with it.
    tokio::spawn(async move {
        let mut chunks = upstream.bytes_stream();
        let mut parser = SseLineParser::new();
        let mut accumulator = StreamAccumulator::new(&store, &conversation);
        let mut forwarded = 0usize;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let wait = idle_timeout.min(remaining);
            let chunk = match tokio::time::timeout(wait, chunks.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "upstream stream failed mid-flight");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        forwarded_bytes = forwarded,
                        "streaming timeout, terminating response"
                    );
                    break;
                }
            };

            // Forward first, then parse: the client must never wait on
            // signature extraction.
            forwarded += chunk.len();
            if tx.send(Ok(chunk.clone())).await.is_err() {
                tracing::debug!("client disconnected, abandoning upstream stream");
                break;
            }
            let now = Instant::now();
            for event in parser.feed(&chunk) {
                accumulator.ingest(&event, now);
            }
        }

        tracing::debug!(
            forwarded_bytes = forwarded,
            captured = accumulator.committed_any(),
            duration_ms = started.elapsed().as_millis() as u64,
            "stream finished"
        );
    });

    build_response(
        status,
        &response_headers,
        Body::from_stream(ReceiverStream::new(rx)),
    )
}

fn build_response(
    status: StatusCode,
    headers: &reqwest::header::HeaderMap,
    body: Body,
) -> Result<Response<Body>, ProxyError> {
    let mut builder = Response::builder().status(status.as_u16());
    for (key, value) in headers.iter() {
        // content-encoding no longer describes the body: reqwest decodes
        // compressed streams before the chunks reach us
        if key == "transfer-encoding"
            || key == "connection"
            || key == "content-length"
            || key == "content-encoding"
        {
            continue;
        }
        builder = builder.header(key.as_str(), value.as_bytes());
    }
    builder
        .body(body)
        .map_err(|e| ProxyError::ResponseBuild(e.to_string()))
}
