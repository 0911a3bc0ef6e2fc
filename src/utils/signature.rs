use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 tag over a raw payload.
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a presented webhook signature against the raw request body.
///
/// The tag must be computed over the exact bytes that were received, never a
/// re-serialized form. Comparison is constant-time. Any malformed input
/// (empty body, empty signature, non-hex signature) yields `false`.
pub fn verify_signature(payload: &[u8], provided: &str, secret: &[u8]) -> bool {
    if payload.is_empty() || provided.is_empty() {
        return false;
    }
    let provided = match hex::decode(provided.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    expected.ct_eq(provided.as_slice()).unwrap_u8() == 1
}
