//! Link to the main MCU.
//!
//! ```text
//!            start_tx(&[u8; 560])                      DMA progress (ISR)
//! Transport ─────────────────────▶ AuxLink ◀──────── main MCU ───────▶ RxChannel
//!   one buffer per SendClass        (UART/DMA)                         per-class slots
//! ```
//!
//! The link is a single-outstanding-transfer byte pipe in each direction.
//! Outbound, [`Transport`] waits for the previous transfer before touching
//! a send buffer; there is no queue. Inbound, the DMA interrupt feeds
//! [`RxChannel`], which the router drains from the main loop.

pub mod rx;
pub mod transport;

pub use rx::RxChannel;
pub use transport::Transport;

use crate::envelope::ENVELOPE_LEN;
use crate::error::TransportError;

/// The UART/DMA peripheral carrying envelopes to and from the main MCU.
///
/// Implementations copy or pin `frame` for the duration of the transfer;
/// the transport does not touch it again until `tx_busy()` reads `false`.
pub trait AuxLink {
    /// A transmit is still in flight.
    fn tx_busy(&self) -> bool;

    /// Launch an asynchronous transmit of one full envelope.
    fn start_tx(&mut self, frame: &[u8; ENVELOPE_LEN]) -> Result<(), TransportError>;

    /// Arm the next inbound transfer. Progress is reported to
    /// [`RxChannel::on_bytes`] from interrupt context.
    fn start_rx(&mut self);
}

/// Retained outbound buffer selector.
///
/// Each class owns one envelope buffer. A FIDO2 retry resends the
/// `Request` buffer verbatim, so replies and events must not reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendClass {
    /// Replies and events generated by the command processor.
    Reply,
    /// Host HID messages forwarded to the main MCU.
    Forward,
    /// Blocking RPC requests.
    Request,
}

impl SendClass {
    pub const fn index(self) -> usize {
        self as usize
    }
}
