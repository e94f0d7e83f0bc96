//! Fuzz target for provider event parsing.
//!
//! This fuzzer tests envelope extraction and event classification to
//! ensure malformed payloads never panic and unrecognized types always
//! classify as `Unknown` rather than an error.
//!
//! Run with:
//! cargo +nightly fuzz run fuzz_event_parse -- -max_total_time=600

#![no_main]

use libfuzzer_sys::fuzz_target;
use sentra_webhooks::{EventEnvelope, PaymentEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Ok(envelope) = EventEnvelope::from_payload(&payload) {
        // An accepted envelope always carries a non-empty id.
        assert!(!envelope.event_id.is_empty());

        match PaymentEvent::classify(&envelope.event_type, &payload) {
            Ok(PaymentEvent::Unknown { event_type }) => {
                assert_eq!(event_type, envelope.event_type);
            }
            // Known types parse or fail on their payload shape.
            Ok(_) | Err(_) => {}
        }
    }

    // Classification of a fixed known type over arbitrary payloads
    // must return rather than panic.
    let _ = PaymentEvent::classify("invoice.paid", &payload);
    let _ = PaymentEvent::classify("customer.subscription.updated", &payload);
});
