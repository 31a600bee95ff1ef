//! 64-byte HID frame header codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────────┬───────────────────────────────┬──────────────┐
//! │ byte0                        │ byte1                         │ payload (62) │
//! │ len:6 │ ack:1 │ flip:1       │ total_packets:4 │ packet_id:4 │ zero-padded  │
//! └──────────────────────────────┴───────────────────────────────┴──────────────┘
//! ```
//!
//! A frame starting `0xFF 0xFF` is the out-of-band reset marker and
//! carries no payload.

/// Size of every frame on the wire.
pub const FRAME_LEN: usize = 64;
/// Payload bytes per frame.
pub const FRAME_PAYLOAD_LEN: usize = 62;
/// Header bytes per frame.
pub const FRAME_HEADER_LEN: usize = 2;

const LEN_MASK: u8 = 0x3F;
const ACK_BIT: u8 = 0x40;
const FLIP_BIT: u8 = 0x80;

/// Decoded `byte0`/`byte1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameHeader {
    /// Meaningful bytes in this frame's payload.
    pub payload_len: u8,
    /// Host requests an echo of the final frame.
    pub ack: bool,
    pub flip: bool,
    /// Index of the last packet (packet count minus one).
    pub total_packets: u8,
    pub packet_id: u8,
}

impl FrameHeader {
    pub fn parse(frame: &[u8; FRAME_LEN]) -> Self {
        Self {
            payload_len: frame[0] & LEN_MASK,
            ack: frame[0] & ACK_BIT != 0,
            flip: frame[0] & FLIP_BIT != 0,
            total_packets: frame[1] & 0x0F,
            packet_id: frame[1] >> 4,
        }
    }

    pub fn write(&self, frame: &mut [u8; FRAME_LEN]) {
        let mut b0 = self.payload_len & LEN_MASK;
        if self.ack {
            b0 |= ACK_BIT;
        }
        if self.flip {
            b0 |= FLIP_BIT;
        }
        frame[0] = b0;
        frame[1] = (self.total_packets & 0x0F) | (self.packet_id << 4);
    }
}

/// `0xFF 0xFF` reset marker.
pub fn is_reset_frame(frame: &[u8; FRAME_LEN]) -> bool {
    frame[0] == 0xFF && frame[1] == 0xFF
}

/// Number of frames needed for `len` payload bytes.
pub const fn packet_count(len: usize) -> usize {
    len.div_ceil(FRAME_PAYLOAD_LEN)
}
