// SSE (Server-Sent Events) framing for streaming responses
//
// The upstream streams chat-completion chunks as line-oriented SSE:
//
// ```
// data: <json payload>
//
// data: [DONE]
// ```
//
// Chunks off the wire split lines at arbitrary byte positions, so the
// parser carries the unterminated tail of each chunk into the next one.
// Payloads that fail to parse as JSON and the `[DONE]` sentinel are
// skipped; forwarding to the client never depends on parse success.

use serde_json::Value;

/// Incremental parser yielding one JSON payload per complete `data:` line.
#[derive(Debug, Default)]
pub struct SseLineParser {
    /// Unterminated tail of the previous chunk, kept as raw bytes: a
    /// multi-byte character split across chunks stays intact here until
    /// its line completes.
    partial: Vec<u8>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of upstream bytes, returning the JSON payloads of
    /// every `data:` line completed by this chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.partial.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            // Only complete lines are decoded; genuinely invalid UTF-8
            // fails the JSON parse and is skipped like any other
            // unparseable event.
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_data_line(line.trim_end_matches(['\r', '\n']).trim()) {
                events.push(event);
            }
        }
        events
    }
}

/// Parse a single SSE line, returning its JSON payload if it is a data
/// line carrying one.
fn parse_data_line(line: &str) -> Option<Value> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    serde_json::from_str(payload).ok()
}
