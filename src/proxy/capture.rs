// Signature capture from buffered responses
//
// Non-streaming responses are scanned once after the full body is read:
// every choice's message tool_calls are walked, and any thought
// signature found is committed to the store keyed by tool-call id. A
// malformed entry (missing id, missing function, wrong shape) is skipped
// on its own - it never aborts extraction for its siblings.

use std::time::Instant;

use serde_json::Value;

use super::accumulator::extract_signature;
use crate::store::SignatureStore;

/// Scan a buffered chat-completion body and commit discovered
/// signatures. Returns how many were stored (logging support).
pub fn capture_signatures(
    body: &[u8],
    store: &SignatureStore,
    conversation: &str,
    now: Instant,
) -> usize {
    let Ok(parsed) = serde_json::from_slice::<Value>(body) else {
        return 0;
    };
    let Some(choices) = parsed.get("choices").and_then(|c| c.as_array()) else {
        return 0;
    };

    let mut captured = 0;
    for choice in choices {
        let Some(tool_calls) = choice
            .get("message")
            .and_then(|m| m.get("tool_calls"))
            .and_then(|t| t.as_array())
        else {
            continue;
        };
        for call in tool_calls {
            let Some(id) = call.get("id").and_then(|v| v.as_str()).filter(|s| !s.is_empty())
            else {
                continue;
            };
            // A well-formed call has a function descriptor with a name;
            // anything else is skipped individually.
            if call
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
                .is_none()
            {
                continue;
            }
            if let Some(token) = extract_signature(call) {
                store.put(conversation, id, &token, now);
                captured += 1;
            }
        }
    }
    captured
}
