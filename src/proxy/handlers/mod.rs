//! Request and response handlers for the proxy
//!
//! This module contains the main request handler (`proxy_handler`) and
//! response handlers for streaming (SSE) and buffered responses.

mod buffered;
mod request;
mod streaming;

pub use request::proxy_handler;
