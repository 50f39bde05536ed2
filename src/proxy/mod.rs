// Proxy module - HTTP server that forwards requests to the upstream API
//
// This module implements the protocol-translating reverse proxy: it
// intercepts OpenAI-style requests, rewrites tool schemas and thought
// signatures for Gemini's OpenAI-compatibility endpoint, forwards the
// result with per-failure-class retries, and relays the response back
// (streamed or buffered).

pub mod accumulator;
pub mod capture;
mod error;
mod handlers;
pub mod retry;
pub mod rewrite;
mod server;
pub mod sse;
mod state;
pub mod translate;
mod upstream;

pub use handlers::proxy_handler;
pub use server::start_proxy;
pub use state::ProxyState;
