//! Inbound reassembly of 64-byte HID frames into one envelope.
//!
//! One reassembler per packetized host interface. The flip bit is a
//! one-bit sequence number for whole messages: it must match on every
//! frame of a message and toggles once the last frame lands.

use log::debug;

use super::frame::{FRAME_HEADER_LEN, FRAME_LEN, FRAME_PAYLOAD_LEN, FrameHeader, is_reset_frame};
use crate::envelope::{Envelope, MessageType, PAYLOAD_LEN};

/// Result of feeding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// More frames expected.
    Pending,
    /// Frame dropped, reassembly restarted.
    Discarded,
    /// Out-of-band reset marker.
    Reset,
    /// Message complete in [`Reassembler::message`]. `ack` echoes the
    /// final frame's ack bit.
    Complete { ack: bool },
}

pub struct Reassembler {
    message: Envelope,
    expected_packet: u8,
    total_packets: u8,
    fill: usize,
    flip: bool,
}

impl Reassembler {
    /// `message_type` tags every completed envelope.
    pub const fn new(message_type: MessageType) -> Self {
        Self {
            message: Envelope::new(message_type),
            expected_packet: 0,
            total_packets: 0,
            fill: 0,
            flip: false,
        }
    }

    /// Drop any partial message. The flip expectation is kept.
    pub fn reset(&mut self) {
        self.expected_packet = 0;
        self.total_packets = 0;
        self.fill = 0;
    }

    /// Forget everything, including the flip expectation.
    pub fn reset_all(&mut self) {
        self.reset();
        self.flip = false;
    }

    pub fn expected_flip(&self) -> bool {
        self.flip
    }

    /// Reassembly in progress.
    pub fn in_flight(&self) -> bool {
        self.expected_packet != 0
    }

    /// Last completed (or partially filled) message.
    pub fn message(&self) -> &Envelope {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut Envelope {
        &mut self.message
    }

    pub fn feed(&mut self, frame: &[u8; FRAME_LEN]) -> Feed {
        if is_reset_frame(frame) {
            self.reset_all();
            return Feed::Reset;
        }

        let hdr = FrameHeader::parse(frame);

        if hdr.flip != self.flip {
            debug!("HID: flip mismatch, dropping frame {}", hdr.packet_id);
            self.reset();
            return Feed::Discarded;
        }

        if hdr.packet_id != self.expected_packet {
            debug!(
                "HID: expected packet {}, got {}",
                self.expected_packet, hdr.packet_id
            );
            self.reset();
            return Feed::Discarded;
        }

        let len = usize::from(hdr.payload_len);
        if len > FRAME_PAYLOAD_LEN {
            self.reset();
            return Feed::Discarded;
        }

        if hdr.packet_id == 0 {
            self.total_packets = hdr.total_packets;
            self.fill = 0;
            let message_type = self.message.message_type;
            self.message.reset(message_type);
        }

        if self.fill + len > PAYLOAD_LEN {
            debug!("HID: message overflows envelope, dropping");
            self.reset();
            return Feed::Discarded;
        }

        self.message.payload[self.fill..self.fill + len]
            .copy_from_slice(&frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len]);
        self.fill += len;
        self.expected_packet += 1;

        if hdr.packet_id < self.total_packets {
            return Feed::Pending;
        }

        self.flip = !self.flip;
        self.message.payload_length1 = self.fill as u16;
        self.reset();
        Feed::Complete { ack: hdr.ack }
    }
}
