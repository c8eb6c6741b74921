//! # Webhook Signature Verification
//!
//! Every processor delivery carries a signature header of the form
//!
//! ```text
//! t=1699999999,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! where `v1` is the hex HMAC-SHA256 of `"{t}.{raw body}"` under the
//! shared signing secret. Verification happens before the body is parsed;
//! a failed check is a permanent 400, never retried against the store.
//!
//! The timestamp bounds replay: deliveries older than the configured
//! tolerance are rejected even with a valid MAC.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification failures.
///
/// All variants map to a 400-class rejection upstream.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    /// Header absent or not in `t=...,v1=...` form
    #[error("Missing or malformed signature header")]
    MalformedHeader,

    /// Timestamp missing or not an integer
    #[error("Invalid signature timestamp")]
    InvalidTimestamp,

    /// Timestamp outside the tolerance window
    #[error("Signature timestamp outside tolerance")]
    Expired,

    /// No candidate signature matched the payload
    #[error("Signature mismatch")]
    Mismatch,
}

/// Verify a webhook signature header against the raw request body.
///
/// ## Arguments
///
/// * `secret` - Shared signing secret
/// * `header` - The signature header value
/// * `payload` - Raw request body bytes
/// * `tolerance_secs` - Maximum accepted timestamp age
/// * `now_unix` - Current unix time (injected for testability)
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse()
                        .map_err(|_| SignatureError::InvalidTimestamp)?,
                );
            }
            Some(("v1", value)) => candidates.push(value),
            // Unknown scheme versions are skipped
            Some(_) => {}
            None => return Err(SignatureError::MalformedHeader),
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    if (now_unix - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    for candidate in candidates {
        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // verify_slice is constant-time
        if mac.verify_slice(&decoded).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = format!("t={},v1={}", NOW, sign(SECRET, NOW, payload));

        assert_eq!(
            verify_signature(SECRET, &header, payload, 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"amount":100}"#;
        let header = format!("t={},v1={}", NOW, sign(SECRET, NOW, payload));

        assert_eq!(
            verify_signature(SECRET, &header, br#"{"amount":999}"#, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"body";
        let header = format!("t={},v1={}", NOW, sign("other_secret", NOW, payload));

        assert_eq!(
            verify_signature(SECRET, &header, payload, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"body";
        let old = NOW - 3600;
        let header = format!("t={},v1={}", old, sign(SECRET, old, payload));

        assert_eq!(
            verify_signature(SECRET, &header, payload, 300, NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let payload = b"body";

        assert_eq!(
            verify_signature(SECRET, "", payload, 300, NOW),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(SECRET, "v1=aabb", payload, 300, NOW),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            verify_signature(SECRET, "t=notanumber,v1=aabb", payload, 300, NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify_signature(SECRET, &format!("t={}", NOW), payload, 300, NOW),
            Err(SignatureError::MalformedHeader)
        );
    }

    #[test]
    fn test_second_candidate_accepted() {
        // Secret rotation sends one signature per live secret
        let payload = b"body";
        let header = format!(
            "t={},v1={},v1={}",
            NOW,
            sign("retired_secret", NOW, payload),
            sign(SECRET, NOW, payload)
        );

        assert_eq!(
            verify_signature(SECRET, &header, payload, 300, NOW),
            Ok(())
        );
    }
}
