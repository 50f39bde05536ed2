// Request body rewriting
//
// Two rewrites happen before a chat-completion request is forwarded:
//
// 1. Every tool's parameter schema is sanitized into the upstream's
//    restricted dialect (see crate::schema).
// 2. Assistant messages carrying tool_calls get their stored thought
//    signature spliced back in. The upstream only reads a signature off
//    the first call of a parallel group, so only tool_calls[0] gets one;
//    if no signature was ever captured for it, a fixed sentinel tells
//    the upstream to skip continuity validation rather than reject.
//
// A body that does not parse as JSON is forwarded untouched (fail-open:
// the proxy never blocks traffic it cannot understand).

use serde_json::{json, Value};

use crate::schema;
use crate::store::SignatureStore;

/// Sentinel accepted by the upstream's signature validator when no real
/// signature exists for a call.
pub const FALLBACK_SIGNATURE: &str = "skip_thought_signature_validator";

/// Rewrite an inbound request body. Returns None when the body is not
/// JSON, in which case the caller forwards the original bytes verbatim.
pub fn rewrite_request_body(
    body: &[u8],
    store: &SignatureStore,
    conversation: &str,
) -> Option<Vec<u8>> {
    let mut request: Value = serde_json::from_slice(body).ok()?;

    sanitize_tools(&mut request);
    inject_signatures(&mut request, store, conversation);

    serde_json::to_vec(&request).ok()
}

/// Does the (already parsed or re-parsed) body flag streaming mode?
pub fn is_streaming_request(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("stream").and_then(|s| s.as_bool()))
        .unwrap_or(false)
}

fn sanitize_tools(request: &mut Value) {
    let Some(tools) = request.get_mut("tools").and_then(|t| t.as_array_mut()) else {
        return;
    };
    for tool in tools {
        let Some(parameters) = tool
            .get_mut("function")
            .and_then(|f| f.get_mut("parameters"))
        else {
            continue;
        };
        *parameters = schema::sanitize(parameters);
    }
}

fn inject_signatures(request: &mut Value, store: &SignatureStore, conversation: &str) {
    let Some(messages) = request.get_mut("messages").and_then(|m| m.as_array_mut()) else {
        return;
    };
    for message in messages {
        if message.get("role").and_then(|r| r.as_str()) != Some("assistant") {
            continue;
        }
        let Some(tool_calls) = message
            .get_mut("tool_calls")
            .and_then(|t| t.as_array_mut())
        else {
            continue;
        };
        // First call of the group only; the rest are passed through.
        let Some(first) = tool_calls.first_mut() else {
            continue;
        };
        let token = first
            .get("id")
            .and_then(|id| id.as_str())
            .and_then(|id| store.get(conversation, id))
            .unwrap_or_else(|| FALLBACK_SIGNATURE.to_string());
        first["extra_content"] = json!({ "google": { "thought_signature": token } });
    }
}
