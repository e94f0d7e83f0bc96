//! HMAC-SHA256 verification for inbound webhook payloads.
//!
//! Providers sign `{timestamp}.{body}` with a shared secret and send the
//! hex signature in `X-Webhook-Signature`. The timestamp travels either
//! in `X-Webhook-Timestamp` or inline as the `t=` element of a
//! `t=<unix>,v1=<hex>` signature header; the explicit header wins when
//! both are present.

use hmac::{Hmac, Mac};
use sentra_core::constants::{WEBHOOK_SIGNATURE_HEADER, WEBHOOK_TIMESTAMP_HEADER};
use sha2::Sha256;

use crate::error::IngressError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature for a webhook payload.
///
/// The signature covers `{timestamp}.{body}` to bind the payload to its
/// delivery time.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature using constant-time comparison.
pub fn verify_signature(expected_hex: &str, secret: &str, timestamp: &str, body: &[u8]) -> bool {
    let computed = compute_signature(secret, timestamp, body);
    constant_time_eq(expected_hex.as_bytes(), computed.as_bytes())
}

/// Signature header contents after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp from the `t=` element, when present.
    pub timestamp: Option<String>,
    /// Hex signature, from `v1=` or the whole header.
    pub signature: String,
}

/// Parse an `X-Webhook-Signature` header value.
///
/// Accepts a bare hex signature or the `t=<unix>,v1=<hex>` scheme. A
/// header with elements but no `v1=` is rejected.
pub fn parse_signature_header(value: &str) -> Option<SignatureHeader> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if !value.contains('=') {
        return Some(SignatureHeader {
            timestamp: None,
            signature: value.to_string(),
        });
    }

    let mut timestamp = None;
    let mut signature = None;
    for element in value.split(',') {
        match element.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t.to_string()),
            Some(("v1", sig)) => signature = Some(sig.to_string()),
            // Unknown scheme versions are ignored for forward compatibility.
            _ => {}
        }
    }

    signature.map(|signature| SignatureHeader { timestamp, signature })
}

/// Authenticate a raw webhook delivery.
///
/// Resolves the timestamp (explicit header preferred), checks it against
/// the tolerance window around `now`, and verifies the signature over
/// the exact timestamp string the sender signed.
pub fn authenticate(
    secret: &str,
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), IngressError> {
    let raw_signature =
        signature_header.ok_or(IngressError::MissingHeader(WEBHOOK_SIGNATURE_HEADER))?;
    let parsed =
        parse_signature_header(raw_signature).ok_or(IngressError::InvalidSignature)?;

    let timestamp = match (timestamp_header, &parsed.timestamp) {
        (Some(header), _) => header.to_string(),
        (None, Some(inline)) => inline.clone(),
        (None, None) => return Err(IngressError::MissingHeader(WEBHOOK_TIMESTAMP_HEADER)),
    };

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| IngressError::StaleTimestamp)?;
    if (now_unix - ts).abs() > tolerance_secs {
        return Err(IngressError::StaleTimestamp);
    }

    if !verify_signature(&parsed.signature, secret, timestamp.trim(), body) {
        return Err(IngressError::InvalidSignature);
    }

    Ok(())
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
