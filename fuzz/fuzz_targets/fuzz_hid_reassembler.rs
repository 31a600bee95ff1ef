//! Fuzz target: `Reassembler::feed`
//!
//! Splits the input into 64-byte frames and feeds them to a reassembler.
//! It must never panic, and a completed message must fit the envelope.
//!
//! cargo fuzz run fuzz_hid_reassembler

#![no_main]

use auxlink::envelope::{MessageType, PAYLOAD_LEN};
use auxlink::hid::{FRAME_LEN, Feed, Reassembler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut rx = Reassembler::new(MessageType::Usb);

    for chunk in data.chunks(FRAME_LEN) {
        let mut frame = [0u8; FRAME_LEN];
        frame[..chunk.len()].copy_from_slice(chunk);
        if let Feed::Complete { .. } = rx.feed(&frame) {
            assert!(usize::from(rx.message().payload_length1) <= PAYLOAD_LEN);
        }
    }

    // A full reset must leave the reassembler waiting for packet 0 again
    rx.reset_all();
    assert!(!rx.in_flight());
    assert!(!rx.expected_flip());
});
