//! Outbound packetization of an envelope payload into 64-byte HID frames.
//!
//! ```text
//! payload (n bytes)
//!   ├─ frame 0: [len | total=N-1, id=0]  bytes   0..62
//!   ├─ frame 1: [len | total=N-1, id=1]  bytes  62..124
//!   └─ frame N-1: [len | total=N-1, id=N-1] tail, zero-padded to 64
//! ```
//!
//! Every frame is emitted at the full 64 bytes so the host's report
//! trigger fires regardless of payload length. The flip bit is always 0
//! on frames we originate.

use super::frame::{FRAME_HEADER_LEN, FRAME_LEN, FRAME_PAYLOAD_LEN, FrameHeader, packet_count};

/// Split `payload` into ready-to-send frames. An empty payload yields
/// no frames.
pub fn packets(payload: &[u8]) -> impl Iterator<Item = [u8; FRAME_LEN]> + '_ {
    let total = packet_count(payload.len()).saturating_sub(1) as u8;
    payload
        .chunks(FRAME_PAYLOAD_LEN)
        .enumerate()
        .map(move |(id, chunk)| {
            let mut frame = [0u8; FRAME_LEN];
            FrameHeader {
                payload_len: chunk.len() as u8,
                ack: false,
                flip: false,
                total_packets: total,
                packet_id: id as u8,
            }
            .write(&mut frame);
            frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + chunk.len()].copy_from_slice(chunk);
            frame
        })
}
