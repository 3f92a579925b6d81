//! GitHub webhook signature verification

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook HMAC-SHA256 signature.
///
/// `signature_header` is the value of `X-Hub-Signature-256`, e.g.
/// `sha256=abc123...`. `body` must be the exact bytes as received; any
/// re-serialization changes the digest and causes false rejection.
///
/// The comparison is constant-time via `Mac::verify_slice`. Callers must map
/// every variant to the same generic response so the caller cannot
/// distinguish a bad signature from a malformed header.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    signature_header: &str,
) -> Result<(), WebhookError> {
    let hex_sig = signature_header
        .strip_prefix("sha256=")
        .ok_or_else(|| WebhookError::Authentication("missing sha256= prefix".to_string()))?;

    let expected = hex::decode(hex_sig)
        .map_err(|_| WebhookError::Authentication("signature is not valid hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| WebhookError::Authentication("invalid HMAC key".to_string()))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::Authentication("signature mismatch".to_string()))
}

/// Compute the `sha256=<hex>` header value for a payload. Used by tests and
/// local tooling to produce valid deliveries.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
