// Streaming tool-call reconstruction
//
// Chat-completion chunks deliver tool calls in fragments: one delta may
// carry just the id, later ones append to the JSON arguments string, and
// the thought signature can arrive in yet another. The accumulator is
// request-scoped state that stitches these back together per tool-call
// index and commits (id, signature) pairs to the store the moment both
// are known - it must not wait for stream end, because the next client
// turn can arrive while this stream is still being forwarded.

use std::time::Instant;

use serde_json::Value;

use crate::store::SignatureStore;

/// Highest tool-call index accepted per turn. Real turns carry a
/// handful of parallel calls; slots are allocated by index, so deltas
/// beyond this bound are dropped instead of sizing the Vec to an
/// arbitrary upstream-supplied integer.
const MAX_TOOL_CALLS_PER_TURN: u64 = 32;

/// A tool call under reconstruction at one index of the current turn.
#[derive(Debug, Default)]
struct Slot {
    id: Option<String>,
    /// Kept for completeness of the reconstructed record; only the
    /// id/token pair feeds the store.
    #[allow(dead_code)]
    name: Option<String>,
    arguments: String,
    token: Option<String>,
    committed: bool,
}

/// Request-scoped accumulator over one streaming response.
///
/// Valid indexes in practice are tiny (parallel tool calls within one
/// turn), so a Vec indexed by position is simpler than a map.
pub struct StreamAccumulator<'a> {
    slots: Vec<Slot>,
    store: &'a SignatureStore,
    conversation: &'a str,
}

impl<'a> StreamAccumulator<'a> {
    pub fn new(store: &'a SignatureStore, conversation: &'a str) -> Self {
        Self {
            slots: Vec::new(),
            store,
            conversation,
        }
    }

    /// Consume one parsed SSE event (a chat.completion.chunk).
    pub fn ingest(&mut self, event: &Value, now: Instant) {
        let Some(choices) = event.get("choices").and_then(|c| c.as_array()) else {
            return;
        };
        for choice in choices {
            let Some(tool_calls) = choice
                .get("delta")
                .and_then(|d| d.get("tool_calls"))
                .and_then(|t| t.as_array())
            else {
                continue;
            };
            for delta in tool_calls {
                self.ingest_delta(delta, now);
            }
        }
    }

    fn ingest_delta(&mut self, delta: &Value, now: Instant) {
        let Some(index) = delta.get("index").and_then(|i| i.as_u64()) else {
            return;
        };
        if index >= MAX_TOOL_CALLS_PER_TURN {
            return;
        }
        let index = index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, Slot::default);
        }
        let slot = &mut self.slots[index];

        // id and name: last non-empty write wins, never cleared
        if let Some(id) = delta.get("id").and_then(|v| v.as_str()) {
            if !id.is_empty() {
                slot.id = Some(id.to_string());
            }
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    slot.name = Some(name.to_string());
                }
            }
            // arguments: append-only fragment stream
            if let Some(fragment) = function.get("arguments").and_then(|v| v.as_str()) {
                slot.arguments.push_str(fragment);
            }
        }
        if let Some(token) = extract_signature(delta) {
            slot.token = Some(token);
        }

        // Commit as soon as id and token are both known; re-commits only
        // refresh the store timestamp.
        if let (Some(id), Some(token)) = (&slot.id, &slot.token) {
            self.store.put(self.conversation, id, token, now);
            slot.committed = true;
        }
    }

    /// Whether any signature reached the store during this stream.
    pub fn committed_any(&self) -> bool {
        self.slots.iter().any(|s| s.committed)
    }

    #[cfg(test)]
    fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }
}

/// Pull the thought signature out of a tool-call value, if present and
/// non-empty. Shared by the streaming and buffered paths.
pub fn extract_signature(tool_call: &Value) -> Option<String> {
    let token = tool_call
        .get("extra_content")?
        .get("google")?
        .get("thought_signature")?
        .as_str()?;
    (!token.is_empty()).then(|| token.to_string())
}
