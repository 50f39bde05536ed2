//! Proxy error types and response handling

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};

/// Errors that surface to the client as proxy-originated responses.
///
/// Upstream-originated rejections are not errors here - they are real
/// responses forwarded (translated) to the client. Only conditions where
/// the proxy itself could not produce an upstream answer take this path.
#[derive(Debug)]
pub(crate) enum ProxyError {
    /// Inbound request body could not be read off the connection.
    BodyRead(String),
    /// Transport-level failure after the retry budget was exhausted.
    Upstream(String),
    /// Local failure assembling the response.
    ResponseBuild(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        let (status, message) = match self {
            ProxyError::BodyRead(msg) => (StatusCode::BAD_REQUEST, msg),
            ProxyError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ProxyError::ResponseBuild(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::error!("Proxy error: {} - {}", status, message);

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "proxy_error",
                "code": status.as_u16(),
            }
        });

        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| Response::new(Body::from("Internal error building error response")))
    }
}
