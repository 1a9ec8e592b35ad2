//! HMAC-SHA256 signing and verification for webhook envelopes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm tag prefixed to every signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the signature for a serialized envelope.
///
/// Returns `"sha256=" + hex(hmac_sha256(secret, body))`. Deterministic:
/// the same bytes and secret always produce the same signature.
pub fn sign(body: &[u8], secret: &str) -> String {
    format!("{SIGNATURE_PREFIX}{}", hmac_hex(body, secret))
}

/// Verify a signature header against the raw, unparsed request body.
///
/// The MAC is recomputed over the exact received bytes, never a
/// re-serialized object, so a parse/serialize mismatch cannot slip
/// through. A missing or malformed header is invalid, not an error.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    let received_hex = match signature_header.strip_prefix(SIGNATURE_PREFIX) {
        Some(h) => h,
        None => return false,
    };

    let computed_hex = hmac_hex(raw_body, secret);
    constant_time_eq(received_hex.as_bytes(), computed_hex.as_bytes())
}

fn hmac_hex(body: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let sig1 = sign(b"payload", "secret");
        let sig2 = sign(b"payload", "secret");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_sign_changes_with_different_secret() {
        assert_ne!(sign(b"payload", "secret1"), sign(b"payload", "secret2"));
    }

    #[test]
    fn test_sign_changes_with_different_body() {
        assert_ne!(sign(b"payload1", "secret"), sign(b"payload2", "secret"));
    }

    #[test]
    fn test_signature_format() {
        let sig = sign(b"payload", "secret");
        assert!(sig.starts_with("sha256="));
        // SHA256 = 32 bytes = 64 hex chars
        let hex_part = sig.strip_prefix("sha256=").unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_valid_signature() {
        let sig = sign(b"test-body", "my-webhook-secret");
        assert!(verify(b"test-body", &sig, "my-webhook-secret"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let sig = sign(b"test-body", "secret-a");
        assert!(!verify(b"test-body", &sig, "secret-b"));
    }

    #[test]
    fn test_verify_rejects_mutated_body() {
        let sig = sign(b"test-body", "secret");
        assert!(!verify(b"test-bodY", &sig, "secret"));
    }

    #[test]
    fn test_verify_rejects_missing_prefix() {
        let sig = sign(b"test-body", "secret");
        let bare_hex = sig.strip_prefix("sha256=").unwrap();
        assert!(!verify(b"test-body", bare_hex, "secret"));
    }

    #[test]
    fn test_verify_rejects_malformed_header() {
        assert!(!verify(b"test-body", "", "secret"));
        assert!(!verify(b"test-body", "sha256=", "secret"));
        assert!(!verify(b"test-body", "md5=abcdef", "secret"));
    }

    #[test]
    fn test_constant_time_eq_equal() {
        assert!(constant_time_eq(b"hello", b"hello"));
    }

    #[test]
    fn test_constant_time_eq_different_length() {
        assert!(!constant_time_eq(b"hello", b"hi"));
    }

    #[test]
    fn test_constant_time_eq_different_content() {
        assert!(!constant_time_eq(b"hello", b"world"));
    }
}
