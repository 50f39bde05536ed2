// Buffered (non-streaming) response handling
//
// The whole upstream body is already in memory (decompressed by reqwest
// when content-encoding asked for it) by the time this runs: a success
// gets one signature-capture scan, a failure gets its error envelope
// translated. Either way the body is then handed back to the client with
// content-length recomputed by the rebuilt response.

use std::time::Instant;

use axum::{body::Body, http::Response};

use crate::proxy::capture::capture_signatures;
use crate::proxy::error::ProxyError;
use crate::proxy::state::ProxyState;
use crate::proxy::translate::translate_error_body;
use crate::proxy::upstream::BufferedResponse;

/// Emit a fully-buffered upstream response to the client.
pub(super) fn emit(
    state: &ProxyState,
    conversation: &str,
    upstream: BufferedResponse,
    started: Instant,
) -> Result<Response<Body>, ProxyError> {
    let status = upstream.status;

    let body = if status.is_client_error() || status.is_server_error() {
        translate_error_body(&upstream.body)
    } else {
        let captured = capture_signatures(&upstream.body, &state.store, conversation, Instant::now());
        if captured > 0 {
            tracing::debug!(captured, conversation, "stored signatures from response");
        }
        upstream.body
    };

    tracing::info!(
        status = status.as_u16(),
        bytes = body.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "buffered response complete"
    );

    let mut builder = Response::builder().status(status.as_u16());
    for (key, value) in upstream.headers.iter() {
        // content-length and content-encoding no longer describe the
        // (decompressed, possibly rewritten) body we are returning
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
        .body(Body::from(body))
        .map_err(|e| ProxyError::ResponseBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::SignatureStore;
    use bytes::Bytes;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn test_state() -> ProxyState {
        ProxyState::new(
            &Config::default(),
            reqwest::Client::new(),
            Arc::new(SignatureStore::new()),
        )
    }

    fn upstream(status: u16, body: Value) -> BufferedResponse {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("content-encoding", "gzip".parse().unwrap());
        headers.insert("x-request-id", "req-1".parse().unwrap());
        BufferedResponse {
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_failure_status_body_translated() {
        let state = test_state();
        let rejected = upstream(
            429,
            json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}}),
        );
        let response = emit(&state, "conv", rejected, Instant::now()).unwrap();

        assert_eq!(response.status().as_u16(), 429);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-1");
        // The buffered body was already decoded, so the coding header
        // must not survive the rebuild
        assert!(response.headers().get("content-encoding").is_none());
        assert_eq!(
            body_json(response).await,
            json!({"error": {"message": "quota", "type": "RESOURCE_EXHAUSTED", "code": 429}})
        );
        assert_eq!(state.store.conversation_count(), 0);
    }

    #[tokio::test]
    async fn test_success_body_passes_through_and_captures() {
        let state = test_state();
        let completion = json!({
            "choices": [{"message": {"tool_calls": [{
                "id": "call_1",
                "function": {"name": "f", "arguments": "{}"},
                "extra_content": {"google": {"thought_signature": "tok"}}
            }]}}]
        });
        let response = emit(&state, "conv", upstream(200, completion.clone()), Instant::now())
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        // Success bodies are scanned, never rewritten
        assert_eq!(body_json(response).await, completion);
        assert_eq!(state.store.get("conv", "call_1"), Some("tok".to_string()));
    }

    #[tokio::test]
    async fn test_success_without_error_shape_untranslated() {
        let state = test_state();
        // An "error" key inside a 200 body belongs to the caller, not
        // the translation layer
        let body = json!({"choices": [], "error": {"code": 1, "message": "inline"}});
        let response = emit(&state, "conv", upstream(200, body.clone()), Instant::now()).unwrap();
        assert_eq!(body_json(response).await, body);
    }
}
