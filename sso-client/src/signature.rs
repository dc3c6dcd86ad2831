//! HMAC-SHA256 signing of the `sso` payload.
//!
//! The signature covers the base64 text exactly as it travels in the `sso`
//! parameter, not the decoded contents.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn sign(secret: &[u8], payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against the expected HMAC of `payload`.
///
/// The comparison is constant-time over the hex strings.
pub fn verify(secret: &[u8], payload: &str, signature: &str) -> bool {
    let expected = sign(secret, payload);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"d836444a9e4084d5b224a60c208dce14";

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign(b"Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_is_deterministic_lowercase_hex() {
        let a = sign(TEST_SECRET, "bm9uY2U9YWJj");
        let b = sign(TEST_SECRET, "bm9uY2U9YWJj");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_verify() {
        let sig = sign(TEST_SECRET, "bm9uY2U9YWJj");
        assert!(verify(TEST_SECRET, "bm9uY2U9YWJj", &sig));
        assert!(!verify(b"other-secret", "bm9uY2U9YWJj", &sig));
        assert!(!verify(TEST_SECRET, "bm9uY2U9YWJk", &sig));
    }

    #[test]
    fn test_verify_rejects_flipped_character() {
        let sig = sign(TEST_SECRET, "payload");
        let mut chars: Vec<char> = sig.chars().collect();
        chars[10] = if chars[10] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();

        assert!(!verify(TEST_SECRET, "payload", &tampered));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let sig = sign(TEST_SECRET, "payload").to_uppercase();
        assert!(!verify(TEST_SECRET, "payload", &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_length() {
        assert!(!verify(TEST_SECRET, "payload", ""));
        assert!(!verify(TEST_SECRET, "payload", "abc"));
    }
}
