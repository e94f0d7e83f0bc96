//! Fuzz target for idempotency request-body hashing.
//!
//! This fuzzer tests the request hash used to fingerprint idempotent
//! request bodies, ensuring it is total, deterministic, and always a
//! lowercase hex SHA-256 digest.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_request_hash -- -max_total_time=600

#![no_main]

use libfuzzer_sys::fuzz_target;
use sentra_api_billing::services::request_hash;
use sha2::{Digest, Sha256};

fuzz_target!(|data: &[u8]| {
    let digest = request_hash(data);

    // Hex SHA-256 is always 64 lowercase hex characters
    assert_eq!(digest.len(), 64);
    assert!(digest
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));

    // Deterministic, and identical to a direct digest
    assert_eq!(digest, hex::encode(Sha256::digest(data)));
    assert_eq!(request_hash(data), digest);
});
