//! In-memory [`AuxLink`] for the simulator and host tests.
//!
//! Every transmitted frame is kept so a test (or the scripted peer in the
//! simulator) can inspect what the aux MCU sent. Transfers can be made to
//! stay "in flight" for a number of `tx_busy` polls to exercise the
//! transport's backpressure.

use std::cell::Cell;

use log::trace;

use crate::envelope::{ENVELOPE_LEN, Envelope, RawEnvelope};
use crate::error::{EnvelopeError, TransportError};
use crate::link::AuxLink;

#[derive(Debug, Default)]
pub struct LoopbackLink {
    sent: Vec<RawEnvelope>,
    rx_armed: u32,
    tx_latency_polls: u32,
    busy_polls_left: Cell<u32>,
    fail_tx: bool,
}

impl LoopbackLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep each transfer busy for `polls` calls to `tx_busy`.
    pub fn with_tx_latency(mut self, polls: u32) -> Self {
        self.tx_latency_polls = polls;
        self
    }

    /// Make every `start_tx` report a link fault.
    pub fn set_fail_tx(&mut self, fail: bool) {
        self.fail_tx = fail;
    }

    pub fn sent(&self) -> &[RawEnvelope] {
        &self.sent
    }

    /// Drain and decode everything transmitted so far.
    pub fn take_sent(&mut self) -> Vec<Result<Envelope, EnvelopeError>> {
        self.sent.drain(..).map(|raw| Envelope::decode(&raw)).collect()
    }

    /// Number of times receive was armed.
    pub fn rx_armed(&self) -> u32 {
        self.rx_armed
    }
}

impl AuxLink for LoopbackLink {
    fn tx_busy(&self) -> bool {
        let left = self.busy_polls_left.get();
        if left == 0 {
            return false;
        }
        self.busy_polls_left.set(left - 1);
        true
    }

    fn start_tx(&mut self, frame: &[u8; ENVELOPE_LEN]) -> Result<(), TransportError> {
        if self.fail_tx {
            return Err(TransportError::LinkFault);
        }
        trace!("LOOPBACK: tx type={}", u16::from_le_bytes([frame[0], frame[1]]));
        self.sent.push(RawEnvelope::from_bytes(*frame));
        self.busy_polls_left.set(self.tx_latency_polls);
        Ok(())
    }

    fn start_rx(&mut self) {
        self.rx_armed += 1;
    }
}
