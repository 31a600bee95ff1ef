//! Dispatch router: drains [`RxChannel`] and routes each inbound envelope.
//!
//! ```text
//!              ┌───────────── fully received, in order Usb, Ble, Other
//! RxChannel ──▶│
//!              └───────────── early snapshot (payload landed, >margin to go)
//!                     │
//!     Usb / Ble ──────┼──▶ Dispatch::forward_to_host
//!     Other ──────────┼──▶ Dispatch::process
//!     Other, awaited ─┴──▶ returned to the blocking caller
//!                          (FIDO2 Retry ⇒ Dispatch::resend_request)
//! ```
//!
//! Early dispatch lets the aux MCU act on a short message while the DMA
//! is still clocking in the zero tail of the 560-byte frame. The receive
//! handoff guarantees each message is dispatched once, whichever path
//! sees it first.

use log::debug;

use crate::envelope::codes::Fido2SubType;
use crate::envelope::payload::Fido2Message;
use crate::envelope::{Envelope, MessageType, Payload, RawEnvelope};
use crate::error::EnvelopeError;
use crate::interface::{HidInterface, InterfaceMap, LogicalInterface, Slot};
use crate::link::RxChannel;

/// Destinations for routed messages.
pub trait Dispatch {
    /// Relay a main-MCU message to a host interface.
    fn forward_to_host(&mut self, iface: HidInterface, env: &Envelope);

    /// Hand an aux-bound message to the command processor. The image is
    /// unvalidated so the processor can see the reset sentinel.
    fn process(&mut self, raw: &RawEnvelope);

    /// Main MCU asked for the outstanding request to be sent again.
    fn resend_request(&mut self);

    /// A host-bound message failed validation.
    fn reject(&mut self, err: EnvelopeError);
}

/// Dispatch counters for one receive class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub full: u32,
    pub early: u32,
}

pub struct Router {
    scratch: RawEnvelope,
    margin: usize,
    stats: InterfaceMap<LogicalInterface, DispatchStats>,
}

impl Router {
    /// `margin`: minimum bytes still outstanding for early dispatch.
    pub fn new(margin: u16) -> Self {
        Self {
            scratch: RawEnvelope::zeroed(),
            margin: usize::from(margin),
            stats: InterfaceMap::default(),
        }
    }

    pub fn stats(&self, iface: LogicalInterface) -> DispatchStats {
        self.stats[iface]
    }

    /// One non-blocking routing pass.
    pub fn poll(&mut self, rx: &RxChannel, sink: &mut impl Dispatch) {
        self.route_pass(rx, sink, None);
    }

    /// One routing pass that also watches for an awaited reply. A message
    /// of type `expected` is returned instead of being processed; anything
    /// else is routed as usual.
    pub fn poll_for(
        &mut self,
        rx: &RxChannel,
        sink: &mut impl Dispatch,
        expected: MessageType,
    ) -> Option<Envelope> {
        self.route_pass(rx, sink, Some(expected))
    }

    fn route_pass(
        &mut self,
        rx: &RxChannel,
        sink: &mut impl Dispatch,
        expected: Option<MessageType>,
    ) -> Option<Envelope> {
        for iface in LogicalInterface::ALL {
            if rx.take_completed(iface, &mut self.scratch) {
                self.stats[iface].full += 1;
                debug!("ROUTER[{iface}]: full {:?}", self.scratch);
                if let Some(reply) = self.route(iface, sink, expected) {
                    return Some(reply);
                }
            }
        }

        let iface = rx.try_early_snapshot(self.margin, &mut self.scratch)?;
        self.stats[iface].early += 1;
        debug!("ROUTER[{iface}]: early {:?}", self.scratch);
        self.route(iface, sink, expected)
    }

    fn route(
        &mut self,
        iface: LogicalInterface,
        sink: &mut impl Dispatch,
        expected: Option<MessageType>,
    ) -> Option<Envelope> {
        if let Some(host) = iface.host() {
            match Envelope::decode(&self.scratch) {
                Ok(env) => sink.forward_to_host(host, &env),
                Err(e) => sink.reject(e),
            }
            return None;
        }

        let awaited = expected.is_some_and(|t| self.scratch.raw_type() == t.code());
        if !awaited {
            sink.process(&self.scratch);
            return None;
        }

        match Envelope::decode(&self.scratch) {
            Ok(env) if is_retry(&env) => {
                debug!("ROUTER[{iface}]: retry requested");
                sink.resend_request();
                None
            }
            Ok(env) => Some(env),
            Err(e) => {
                sink.reject(e);
                None
            }
        }
    }
}

fn is_retry(env: &Envelope) -> bool {
    matches!(
        env.payload(),
        Payload::Fido2(Fido2Message { sub_type, .. }) if sub_type == Fido2SubType::Retry.code()
    )
}
