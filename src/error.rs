//! Unified error types for the aux comms core.
//!
//! A single `Error` enum that every subsystem converts into, so callers at
//! the application edge handle comms failures uniformly. All variants are
//! `Copy` and allocation-free; they are passed through the router and the
//! blocking RPC helper by value.

use core::fmt;

use crate::envelope::MessageType;

// ---------------------------------------------------------------------------
// Top-level comms error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A received envelope could not be decoded.
    Envelope(EnvelopeError),
    /// The link to the main MCU failed.
    Transport(TransportError),
    /// A host-facing HID transfer failed.
    Hid(HidError),
    /// A blocking request to the main MCU failed.
    Rpc(RpcError),
    /// The keyboard collaborator could not type a key.
    Keyboard(KeyboardError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Envelope(e) => write!(f, "envelope: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Hid(e) => write!(f, "hid: {e}"),
            Self::Rpc(e) => write!(f, "rpc: {e}"),
            Self::Keyboard(e) => write!(f, "keyboard: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Envelope errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    /// `message_type` is outside the closed type space.
    UnknownType(u16),
    /// `payload_length1` is larger than the variant can hold.
    LengthExceedsCapacity {
        message_type: MessageType,
        declared: u16,
        capacity: u16,
    },
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => write!(f, "unknown message type 0x{t:04x}"),
            Self::LengthExceedsCapacity {
                message_type,
                declared,
                capacity,
            } => write!(
                f,
                "{message_type:?} declares {declared} payload bytes, capacity is {capacity}"
            ),
        }
    }
}

impl From<EnvelopeError> for Error {
    fn from(e: EnvelopeError) -> Self {
        Self::Envelope(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The main MCU kept the no-comms line asserted past the release timeout.
    PeerUnresponsive,
    /// The link peripheral refused to start a transfer.
    LinkFault,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerUnresponsive => write!(f, "main MCU did not release no-comms line"),
            Self::LinkFault => write!(f, "link peripheral fault"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// HID errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidError {
    /// USB unconfigured / idle, or BLE host gone.
    Disconnected,
    /// The previous frame never completed within the BLE send window.
    SendTimeout,
    /// The endpoint rejected the frame.
    EndpointBusy,
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "interface disconnected"),
            Self::SendTimeout => write!(f, "send timed out"),
            Self::EndpointBusy => write!(f, "endpoint busy"),
        }
    }
}

impl From<HidError> for Error {
    fn from(e: HidError) -> Self {
        Self::Hid(e)
    }
}

// ---------------------------------------------------------------------------
// RPC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcError {
    /// No reply of the expected type before the deadline.
    Timeout,
    /// A reply arrived but its length or contents were not acceptable.
    InvalidReply,
    /// The request could not be sent.
    Transport(TransportError),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for main MCU"),
            Self::InvalidReply => write!(f, "invalid reply"),
            Self::Transport(e) => write!(f, "send failed: {e}"),
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

// ---------------------------------------------------------------------------
// Keyboard errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardError {
    /// The target interface is not enumerated / connected.
    NotConnected,
    /// The HID report could not be delivered.
    ReportFailed,
}

impl fmt::Display for KeyboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "interface not connected"),
            Self::ReportFailed => write!(f, "key report failed"),
        }
    }
}

impl From<KeyboardError> for Error {
    fn from(e: KeyboardError) -> Self {
        Self::Keyboard(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document could not be parsed.
    Malformed,
    /// A field failed range validation. Names the field.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed config document"),
            Self::ValidationFailed(field) => write!(f, "validation failed: {field}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
