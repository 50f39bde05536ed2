// Error envelope translation
//
// Upstream failures arrive in Google's error shape:
//
//   {"error": {"code": 400, "message": "...", "status": "INVALID_ARGUMENT"}}
//
// OpenAI clients expect:
//
//   {"error": {"message": "...", "type": "INVALID_ARGUMENT", "code": 400}}
//
// Anything that doesn't parse, or has no error object, passes through
// unchanged - the proxy never invents error bodies for responses it
// cannot understand.

use bytes::Bytes;
use serde_json::{json, Value};

/// Rewrite an upstream error body into the OpenAI-style envelope.
pub fn translate_error_body(body: &Bytes) -> Bytes {
    let Ok(parsed) = serde_json::from_slice::<Value>(body) else {
        return body.clone();
    };
    let Some(error) = parsed.get("error").filter(|e| e.is_object()) else {
        return body.clone();
    };

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Upstream request failed");
    let translated = json!({
        "error": {
            "message": message,
            "type": error.get("status").cloned().unwrap_or(Value::Null),
            "code": error.get("code").cloned().unwrap_or(Value::Null),
        }
    });
    Bytes::from(translated.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translates_google_envelope() {
        let body = Bytes::from(
            r#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT"}}"#,
        );
        let translated: Value = serde_json::from_slice(&translate_error_body(&body)).unwrap();
        assert_eq!(
            translated,
            serde_json::json!({
                "error": {"message": "bad", "type": "INVALID_ARGUMENT", "code": 400}
            })
        );
    }

    #[test]
    fn test_missing_message_gets_default() {
        let body = Bytes::from(r#"{"error":{"code":500,"status":"INTERNAL"}}"#);
        let translated: Value = serde_json::from_slice(&translate_error_body(&body)).unwrap();
        assert_eq!(translated["error"]["message"], "Upstream request failed");
        assert_eq!(translated["error"]["type"], "INTERNAL");
    }

    #[test]
    fn test_non_json_unchanged() {
        let body = Bytes::from("<html>502 Bad Gateway</html>");
        assert_eq!(translate_error_body(&body), body);
    }

    #[test]
    fn test_error_free_json_unchanged() {
        let body = Bytes::from(r#"{"choices":[{"message":{"content":"hi"}}]}"#);
        assert_eq!(translate_error_body(&body), body);
    }

    #[test]
    fn test_scalar_error_field_unchanged() {
        let body = Bytes::from(r#"{"error":"rate limited"}"#);
        assert_eq!(translate_error_body(&body), body);
    }
}
