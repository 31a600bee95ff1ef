//! The fixed-size message exchanged with the main MCU.
//!
//! Wire image (little-endian, always 560 bytes on the link):
//! ```text
//! ┌──────────────┬─────────────────┬──────────────────┬─────────────────┬───────────┐
//! │ message_type │ payload_length1 │ payload (552 B)  │ payload_length2 │ flags     │
//! │ u16 @0       │ u16 @2          │ @4               │ u16 @556        │ u16 @558  │
//! └──────────────┴─────────────────┴──────────────────┴─────────────────┴───────────┘
//! ```
//!
//! [`RawEnvelope`] is the byte image the link and the ISR handoff work on;
//! it can hold any bit pattern, including unknown types and the all-0xFF
//! reset sentinel. [`Envelope`] is the validated form: a known
//! [`MessageType`] and a `payload_length1` within that type's capacity.

pub mod codes;
pub mod payload;

use core::fmt;

use crate::error::EnvelopeError;
use crate::interface::LogicalInterface;

pub use payload::Payload;

/// Size of the wire image.
pub const ENVELOPE_LEN: usize = 560;
/// `message_type` + `payload_length1`.
pub const HEADER_LEN: usize = 4;
/// Size of the payload union.
pub const PAYLOAD_LEN: usize = 552;

const LEN2_OFFSET: usize = HEADER_LEN + PAYLOAD_LEN;
const FLAGS_OFFSET: usize = LEN2_OFFSET + 2;

/// Fill byte of the out-of-band reset envelope.
pub const RESET_SENTINEL_BYTE: u8 = 0xFF;

// ── Message type ─────────────────────────────────────────────

/// Selects the payload variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    Usb = 0x0000,
    Ble = 0x0001,
    Bootloader = 0x0002,
    PlatformDetails = 0x0003,
    MainCommand = 0x0004,
    AuxEvent = 0x0005,
    NimhCharge = 0x0006,
    PingWithInfo = 0x0007,
    KeyboardType = 0x0008,
    Fido2 = 0x0009,
    RngTransfer = 0x000A,
    BleCommand = 0x000B,
}

impl MessageType {
    /// Largest `payload_length1` this variant can carry.
    pub const fn payload_capacity(self) -> u16 {
        match self {
            Self::Bootloader => payload::BOOTLOADER_MESSAGE_LEN as u16,
            Self::PlatformDetails => payload::PLATFORM_DETAILS_LEN as u16,
            Self::NimhCharge => payload::NIMH_STATUS_LEN as u16,
            _ => PAYLOAD_LEN as u16,
        }
    }

    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Receive class on the main-MCU link.
    pub const fn interface(self) -> LogicalInterface {
        LogicalInterface::for_message_type(self as u16)
    }
}

impl TryFrom<u16> for MessageType {
    type Error = EnvelopeError;

    fn try_from(raw: u16) -> Result<Self, EnvelopeError> {
        Ok(match raw {
            0x0000 => Self::Usb,
            0x0001 => Self::Ble,
            0x0002 => Self::Bootloader,
            0x0003 => Self::PlatformDetails,
            0x0004 => Self::MainCommand,
            0x0005 => Self::AuxEvent,
            0x0006 => Self::NimhCharge,
            0x0007 => Self::PingWithInfo,
            0x0008 => Self::KeyboardType,
            0x0009 => Self::Fido2,
            0x000A => Self::RngTransfer,
            0x000B => Self::BleCommand,
            other => return Err(EnvelopeError::UnknownType(other)),
        })
    }
}

// ── Raw wire image ───────────────────────────────────────────

/// Unvalidated 560-byte wire image.
#[derive(Clone, PartialEq, Eq)]
pub struct RawEnvelope([u8; ENVELOPE_LEN]);

impl RawEnvelope {
    pub const fn zeroed() -> Self {
        Self([0; ENVELOPE_LEN])
    }

    pub const fn from_bytes(bytes: [u8; ENVELOPE_LEN]) -> Self {
        Self(bytes)
    }

    /// The all-0xFF reset envelope.
    pub const fn reset_sentinel() -> Self {
        Self([RESET_SENTINEL_BYTE; ENVELOPE_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; ENVELOPE_LEN] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; ENVELOPE_LEN] {
        &mut self.0
    }

    pub fn raw_type(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn payload_length1(&self) -> u16 {
        u16::from_le_bytes([self.0[2], self.0[3]])
    }

    /// Receive class this image belongs to.
    pub fn interface(&self) -> LogicalInterface {
        LogicalInterface::for_message_type(self.raw_type())
    }

    /// True when every byte is the reset fill byte.
    pub fn is_reset_sentinel(&self) -> bool {
        self.0.iter().all(|&b| b == RESET_SENTINEL_BYTE)
    }

    /// Overwrite with `prefix` followed by zeros.
    pub fn fill_from_prefix(&mut self, prefix: &[u8]) {
        let n = prefix.len().min(ENVELOPE_LEN);
        self.0[..n].copy_from_slice(&prefix[..n]);
        self.0[n..].fill(0);
    }

    pub fn clear(&mut self) {
        self.0.fill(0);
    }
}

impl Default for RawEnvelope {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for RawEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEnvelope")
            .field("type", &format_args!("0x{:04x}", self.raw_type()))
            .field("len1", &self.payload_length1())
            .finish_non_exhaustive()
    }
}

// ── Validated envelope ───────────────────────────────────────

/// A decoded envelope with a known type and an in-bounds `payload_length1`.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub message_type: MessageType,
    /// Count of meaningful bytes in `payload`.
    pub payload_length1: u16,
    pub payload: [u8; PAYLOAD_LEN],
    /// Inbound: payload-valid marker. Outbound: reply requested.
    pub payload_length2: u16,
    pub flags: u16,
}

impl Envelope {
    /// Zeroed envelope stamped with `message_type`.
    pub const fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            payload_length1: 0,
            payload: [0; PAYLOAD_LEN],
            payload_length2: 0,
            flags: 0,
        }
    }

    /// Zero every field and stamp a new type.
    pub fn reset(&mut self, message_type: MessageType) {
        self.message_type = message_type;
        self.payload_length1 = 0;
        self.payload.fill(0);
        self.payload_length2 = 0;
        self.flags = 0;
    }

    pub fn encode(&self) -> RawEnvelope {
        let mut raw = RawEnvelope::zeroed();
        self.encode_into(&mut raw);
        raw
    }

    pub fn encode_into(&self, raw: &mut RawEnvelope) {
        let b = raw.as_bytes_mut();
        b[0..2].copy_from_slice(&self.message_type.code().to_le_bytes());
        b[2..4].copy_from_slice(&self.payload_length1.to_le_bytes());
        b[HEADER_LEN..LEN2_OFFSET].copy_from_slice(&self.payload);
        b[LEN2_OFFSET..FLAGS_OFFSET].copy_from_slice(&self.payload_length2.to_le_bytes());
        b[FLAGS_OFFSET..].copy_from_slice(&self.flags.to_le_bytes());
    }

    /// Validate a wire image.
    pub fn decode(raw: &RawEnvelope) -> Result<Self, EnvelopeError> {
        let message_type = MessageType::try_from(raw.raw_type())?;
        let declared = raw.payload_length1();
        let capacity = message_type.payload_capacity();
        if declared > capacity {
            return Err(EnvelopeError::LengthExceedsCapacity {
                message_type,
                declared,
                capacity,
            });
        }

        let b = raw.as_bytes();
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&b[HEADER_LEN..LEN2_OFFSET]);
        Ok(Self {
            message_type,
            payload_length1: declared,
            payload,
            payload_length2: u16::from_le_bytes([b[LEN2_OFFSET], b[LEN2_OFFSET + 1]]),
            flags: u16::from_le_bytes([b[FLAGS_OFFSET], b[FLAGS_OFFSET + 1]]),
        })
    }

    /// Typed view of the payload.
    pub fn payload(&self) -> Payload<'_> {
        Payload::parse(self.message_type, &self.payload)
    }

    /// The meaningful payload bytes.
    pub fn body(&self) -> &[u8] {
        &self.payload[..usize::from(self.payload_length1).min(PAYLOAD_LEN)]
    }

    /// Copy `bytes` to the start of the payload and set `payload_length1`.
    /// Bytes beyond the type's capacity are dropped.
    pub fn set_body(&mut self, bytes: &[u8]) {
        let n = bytes
            .len()
            .min(usize::from(self.message_type.payload_capacity()));
        self.payload[..n].copy_from_slice(&bytes[..n]);
        self.payload_length1 = n as u16;
    }

    pub fn payload_u16(&self, index: usize) -> u16 {
        let at = index * 2;
        u16::from_le_bytes([self.payload[at], self.payload[at + 1]])
    }

    pub fn set_payload_u16(&mut self, index: usize, value: u16) {
        let at = index * 2;
        self.payload[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type", &self.message_type)
            .field("len1", &self.payload_length1)
            .field("body", &self.body())
            .field("len2", &self.payload_length2)
            .field("flags", &self.flags)
            .finish()
    }
}
