//! Fuzz target: `Envelope::decode`
//!
//! Any 560 bytes off the inter-MCU link must decode without panicking,
//! and an accepted envelope must re-encode to a frame that decodes to
//! the same value.
//!
//! cargo fuzz run fuzz_envelope_decode

#![no_main]

use auxlink::envelope::{ENVELOPE_LEN, Envelope, PAYLOAD_LEN, RawEnvelope};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut bytes = [0u8; ENVELOPE_LEN];
    let n = data.len().min(ENVELOPE_LEN);
    bytes[..n].copy_from_slice(&data[..n]);

    let Ok(env) = Envelope::decode(&RawEnvelope::from_bytes(bytes)) else {
        return;
    };
    assert!(usize::from(env.payload_length1) <= PAYLOAD_LEN);

    let again = Envelope::decode(&env.encode()).expect("re-encoded envelope decodes");
    assert_eq!(again, env);
    let _ = env.payload();
});
