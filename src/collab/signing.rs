//! HMAC-SHA256 webhook signatures.
//!
//! Outbound bodies are signed as lowercase hex over the exact bytes sent.
//! Inbound signatures are accepted from any of the common header names,
//! with or without an `HMAC ` / `sha256=` prefix, and compared in constant
//! time.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header names checked for an inbound signature, in order.
pub const SIGNATURE_HEADERS: [&str; 4] = [
    "x-webhook-signature",
    "x-n8n-signature",
    "x-signature",
    "authorization",
];

pub const OUTBOUND_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Strip a known prefix from a raw header value.
fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("HMAC ").unwrap_or(trimmed);
    trimmed.strip_prefix("sha256=").unwrap_or(trimmed).trim()
}

/// First signature found in the request headers.
pub fn extract_signature(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(normalize)
            .filter(|sig| !sig.is_empty())
            .map(str::to_string)
    })
}

/// Constant-time check of a hex signature over `body`.
pub fn verify(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(normalize(signature_hex)) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"workflow-shared-secret";

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"signal_id":"d1","status":"COMPLETED"}"#;
        let sig = sign(SECRET, body);
        assert_eq!(sig.len(), 64);
        assert!(verify(SECRET, body, &sig));
        assert!(verify(SECRET, body, &format!("sha256={}", sig)));
        assert!(!verify(SECRET, b"{}", &sig));
        assert!(!verify(b"other-secret", body, &sig));
        assert!(!verify(SECRET, body, "not-hex"));
        assert!(!verify(b"", body, &sig));
    }

    #[test]
    fn test_extract_signature_header_order_and_prefixes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("HMAC abc123"));
        assert_eq!(extract_signature(&headers).as_deref(), Some("abc123"));

        headers.insert("x-n8n-signature", HeaderValue::from_static("sha256=def456"));
        assert_eq!(extract_signature(&headers).as_deref(), Some("def456"));

        headers.insert("x-webhook-signature", HeaderValue::from_static("0a0b"));
        assert_eq!(extract_signature(&headers).as_deref(), Some("0a0b"));
    }

    #[test]
    fn test_missing_signature() {
        assert!(extract_signature(&HeaderMap::new()).is_none());
    }
}
