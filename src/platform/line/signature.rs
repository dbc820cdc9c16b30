//! `X-LINE-ChannelSignature` verification.
//!
//! The header carries base64(HMAC-SHA256(channel secret, raw body)).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-LINE-ChannelSignature";

/// Returns true if `signature` matches `body` under `channel_secret`.
/// A missing, empty or undecodable signature is simply invalid.
pub fn validate_signature(channel_secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub(crate) fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(channel_secret.as_bytes()).expect("HMAC takes any key size");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "testsecret";

    #[test]
    fn test_valid_signature() {
        let body = br#"{"result":[]}"#;
        let sig = sign(SECRET, body);
        assert!(validate_signature(SECRET, body, Some(&sig)));
    }

    #[test]
    fn test_tampered_body() {
        let sig = sign(SECRET, br#"{"result":[]}"#);
        assert!(!validate_signature(SECRET, br#"{"result":[1]}"#, Some(&sig)));
    }

    #[test]
    fn test_wrong_secret() {
        let body = b"hello";
        let sig = sign("other", body);
        assert!(!validate_signature(SECRET, body, Some(&sig)));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(!validate_signature(SECRET, b"hello", None));
        assert!(!validate_signature(SECRET, b"hello", Some("")));
        assert!(!validate_signature(SECRET, b"hello", Some("not base64 !!")));
        // Valid base64, wrong length
        assert!(!validate_signature(SECRET, b"hello", Some("YWJj")));
    }
}
