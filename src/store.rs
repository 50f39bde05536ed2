// Conversation keying and the signature store
//
// Gemini's OpenAI-compat layer hands back an opaque "thought signature"
// with each tool call and expects it echoed on the next turn of the same
// conversation. OpenAI clients know nothing about this, so the proxy
// remembers signatures per conversation and splices them back in.
//
// Conversations are identified either by an explicit client-supplied
// session header or, failing that, by a digest of the client's address
// and user agent. The digest is a best-effort isolation mechanism so two
// tenants behind the proxy don't swap signatures - it is not an
// authentication boundary.
//
// The store is created once at startup and passed through ProxyState;
// all timing comes in as `Instant` arguments so tests drive a synthetic
// clock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

/// Signatures older than this are dropped on sweep.
const SIGNATURE_TTL: Duration = Duration::from_secs(60 * 60);

/// Maximum signatures retained per conversation; oldest evicted beyond it.
const MAX_SIGNATURES_PER_CONVERSATION: usize = 100;

/// Derive the cache key identifying one logical conversation.
///
/// An explicit session id is used verbatim so callers can pick their own
/// identifiers; the two namespaces (`explicit:` / `auto:`) can never
/// collide with each other.
pub fn derive_conversation_key(
    session_id: Option<&str>,
    peer_addr: Option<SocketAddr>,
    user_agent: Option<&str>,
) -> String {
    if let Some(id) = session_id {
        return format!("explicit:{id}");
    }

    // Same digest-and-truncate idiom we use for any identity material:
    // sha256, first 16 lowercase hex chars.
    let addr = peer_addr.map(|a| a.ip().to_string()).unwrap_or_default();
    let agent = user_agent.unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(addr.as_bytes());
    hasher.update(agent.as_bytes());
    let hash = hasher.finalize();
    format!("auto:{}", &format!("{hash:x}")[..16])
}

/// One remembered signature for a (conversation, tool-call id) pair.
#[derive(Debug, Clone)]
struct SignatureRecord {
    token: String,
    stored_at: Instant,
}

/// In-memory signature cache: conversation key -> tool-call id -> record.
///
/// A single store-level mutex guards the maps; every critical section is
/// a handful of map operations and sweep is O(live records), which the
/// per-conversation cap keeps small. Invariant: no conversation entry
/// ever holds an empty map.
#[derive(Debug, Default)]
pub struct SignatureStore {
    conversations: Mutex<HashMap<String, HashMap<String, SignatureRecord>>>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the signature for a tool call within a conversation.
    pub fn get(&self, conversation: &str, tool_call_id: &str) -> Option<String> {
        let conversations = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        conversations
            .get(conversation)?
            .get(tool_call_id)
            .map(|r| r.token.clone())
    }

    /// Store a signature, overwriting any existing record for the same
    /// tool-call id. Re-puts are harmless: they refresh token and
    /// timestamp together.
    pub fn put(&self, conversation: &str, tool_call_id: &str, token: &str, now: Instant) {
        let mut conversations = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        conversations
            .entry(conversation.to_string())
            .or_default()
            .insert(
                tool_call_id.to_string(),
                SignatureRecord {
                    token: token.to_string(),
                    stored_at: now,
                },
            );
    }

    /// Expiry and capacity pass, run inline on every inbound request.
    ///
    /// Drops records older than the TTL, removes conversations whose maps
    /// become empty, and trims any conversation over the cap by evicting
    /// its oldest records (sort-and-trim: the cap is small enough that a
    /// heap would be overkill).
    pub fn sweep(&self, now: Instant) {
        let mut conversations = self.conversations.lock().unwrap_or_else(|e| e.into_inner());

        conversations.retain(|_, records| {
            records.retain(|_, r| now.duration_since(r.stored_at) <= SIGNATURE_TTL);

            if records.len() > MAX_SIGNATURES_PER_CONVERSATION {
                let mut by_age: Vec<(String, Instant)> = records
                    .iter()
                    .map(|(id, r)| (id.clone(), r.stored_at))
                    .collect();
                by_age.sort_by_key(|(_, stored_at)| *stored_at);
                let excess = records.len() - MAX_SIGNATURES_PER_CONVERSATION;
                for (id, _) in by_age.into_iter().take(excess) {
                    records.remove(&id);
                }
            }

            !records.is_empty()
        });
    }

    /// Number of live conversations (test and logging support).
    pub fn conversation_count(&self) -> usize {
        let conversations = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        conversations.len()
    }
}
