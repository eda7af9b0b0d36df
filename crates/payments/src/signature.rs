//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! The signed payload is `"{t}.{body}"`, MACed with the endpoint secret
//! using HMAC-SHA256.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed delivery, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Compute the hex `v1` signature for `payload` signed at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `header` against `payload`. `now` is the current Unix time.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".into()))?;
    if candidates.is_empty() {
        return Err(PaymentError::InvalidSignature("no v1 signature".into()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload);
    if candidates
        .iter()
        .any(|c| constant_time_eq(c.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".into()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"invoice.payment_succeeded"}"#;

    fn header(t: i64) -> String {
        format!("t={t},v1={}", compute_signature(SECRET, t, BODY))
    }

    #[test]
    fn signature_is_hex_sha256() {
        let sig = compute_signature(SECRET, 1, BODY);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn valid_signature_passes() {
        assert!(verify_signature(BODY, &header(1000), SECRET, 1100, 300).is_ok());
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let h = format!("t=1000,v1=deadbeef,{}", &header(1000)[7..]);
        assert!(verify_signature(BODY, &h, SECRET, 1000, 300).is_ok());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        assert_matches!(
            verify_signature(BODY, &header(1000), SECRET, 1301, 300),
            Err(PaymentError::InvalidSignature(_))
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        assert_matches!(
            verify_signature(b"{}", &header(1000), SECRET, 1000, 300),
            Err(PaymentError::InvalidSignature(_))
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(verify_signature(BODY, &header(1000), "other", 1000, 300).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(verify_signature(BODY, "garbage", SECRET, 1000, 300).is_err());
        assert!(verify_signature(BODY, "t=1000", SECRET, 1000, 300).is_err());
    }
}
