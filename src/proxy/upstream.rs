// Single upstream attempt
//
// One attempt = build the forwarded request, send it, and (for buffered
// mode) read the whole body. The retry layer decides whether an attempt
// is repeated; this module only reports classified outcomes.
//
// Two timeouts guard every attempt: a hard ceiling on the whole attempt
// and an idle ceiling between body chunks. Either firing is a transport
// failure - the response head was never surfaced to the client, so the
// attempt is safely retryable.

use std::time::Duration;

use axum::http::HeaderMap;
use bytes::{Bytes, BytesMut};

use super::retry::Attempted;

/// Everything needed to replay one upstream request across attempts.
#[derive(Clone)]
pub struct UpstreamRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamRequest {
    fn build(&self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut req = client
            .request(self.method.clone(), &self.url)
            .body(self.body.clone());
        for (key, value) in self.headers.iter() {
            // host is rewritten by the url; content-length is recomputed
            // after body rewriting; accept-encoding is dropped so reqwest
            // negotiates only codings its decoder handles (the client may
            // offer br/zstd, which would arrive still compressed); the
            // rest are hop-by-hop
            if key == "host"
                || key == "content-length"
                || key == "accept-encoding"
                || key == "connection"
                || key == "transfer-encoding"
            {
                continue;
            }
            req = req.header(key.as_str(), value.as_bytes());
        }
        req
    }
}

/// A fully-read non-streaming response.
pub struct BufferedResponse {
    pub status: reqwest::StatusCode,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
}

impl Attempted for BufferedResponse {
    fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    fn retry_after_secs(&self) -> Option<u64> {
        retry_after_secs(&self.headers)
    }
}

impl Attempted for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn retry_after_secs(&self) -> Option<u64> {
        retry_after_secs(self.headers())
    }
}

/// Integer-seconds Retry-After; anything else falls back to the fixed
/// backoff schedule.
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// One buffered attempt: send and read the entire body into memory.
/// reqwest's gzip support transparently decompresses on the way in.
pub async fn buffered_attempt(
    client: &reqwest::Client,
    request: &UpstreamRequest,
    total_timeout: Duration,
    idle_timeout: Duration,
) -> Result<BufferedResponse, String> {
    let attempt = async {
        let mut response = request
            .build(client)
            .send()
            .await
            .map_err(|e| format!("upstream connection failed: {e}"))?;

        let status = response.status();
        let headers = response.headers().clone();

        let mut body = BytesMut::new();
        loop {
            let chunk = tokio::time::timeout(idle_timeout, response.chunk())
                .await
                .map_err(|_| "upstream idle timeout while reading body".to_string())?
                .map_err(|e| format!("upstream body read failed: {e}"))?;
            match chunk {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }

        Ok(BufferedResponse {
            status,
            headers,
            body: body.freeze(),
        })
    };

    tokio::time::timeout(total_timeout, attempt)
        .await
        .map_err(|_| "upstream response timeout".to_string())?
}

/// One streaming attempt: send and return the response head. The body
/// stream is consumed by the caller, chunk by chunk, once this attempt
/// has been accepted - from that point failures are terminal, not
/// retryable.
pub async fn streaming_attempt(
    client: &reqwest::Client,
    request: &UpstreamRequest,
    head_timeout: Duration,
) -> Result<reqwest::Response, String> {
    tokio::time::timeout(head_timeout, request.build(client).send())
        .await
        .map_err(|_| "upstream response timeout".to_string())?
        .map_err(|e| format!("upstream connection failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", "client.example".parse().unwrap());
        headers.insert("content-length", "42".parse().unwrap());
        headers.insert("accept-encoding", "gzip, deflate, br, zstd".parse().unwrap());
        headers.insert("authorization", "Bearer key".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers
    }

    #[test]
    fn test_build_drops_hop_by_hop_and_encoding_headers() {
        let request = UpstreamRequest {
            method: reqwest::Method::POST,
            url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            headers: forwarded_headers(),
            body: Bytes::from_static(b"{}"),
        };
        let client = reqwest::Client::new();
        let built = request.build(&client).build().unwrap();

        // The client may offer codings the proxy cannot decode; the
        // forwarded request must not repeat them upstream
        assert!(built.headers().get("accept-encoding").is_none());
        assert!(built.headers().get("host").is_none());
        assert!(built.headers().get("content-length").is_none());
        assert_eq!(built.headers().get("authorization").unwrap(), "Bearer key");
        assert_eq!(
            built.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_retry_after_integer_seconds_only() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(reqwest::header::RETRY_AFTER, " 7 ".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), Some(7));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after_secs(&headers), None);
    }
}
