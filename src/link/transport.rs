//! Outbound side of the main-MCU link.
//!
//! Backpressure is the only flow control: every operation that touches a
//! send buffer first waits for the previous transfer to finish. Nothing is
//! queued, so memory is bounded to one envelope per [`SendClass`].
//!
//! ```text
//! send(class)
//!   │ wait tx idle ─▶ settle delay ─▶ wake peer if asleep ─▶ wait no-comms release
//!   └──────────────────────────────────────────────────────────────▶ start_tx
//! ```

use log::{debug, info, warn};

use super::{AuxLink, RxChannel, SendClass};
use crate::app::ports::Ports;
use crate::config::LinkConfig;
use crate::envelope::codes::AuxEvent;
use crate::envelope::payload::EventMessage;
use crate::envelope::{Envelope, MessageType, RawEnvelope};
use crate::error::TransportError;

/// Timing parameters copied out of [`LinkConfig`].
#[derive(Debug, Clone, Copy)]
struct Timing {
    settle_us: u32,
    wake_delay_ms: u32,
    release_timeout_ms: u32,
}

/// Main MCU sleep bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
struct PeerSleep {
    requested: bool,
    wake_not_before_ms: u64,
}

/// Owns the link and the retained send buffers.
pub struct Transport<'r, L: AuxLink> {
    link: L,
    rx: &'r RxChannel,
    buffers: [Envelope; 3],
    wire: RawEnvelope,
    peer: PeerSleep,
    timing: Timing,
}

impl<'r, L: AuxLink> Transport<'r, L> {
    pub fn new(link: L, rx: &'r RxChannel, config: &LinkConfig) -> Self {
        Self {
            link,
            rx,
            buffers: [
                Envelope::new(MessageType::AuxEvent),
                Envelope::new(MessageType::Usb),
                Envelope::new(MessageType::MainCommand),
            ],
            wire: RawEnvelope::zeroed(),
            peer: PeerSleep::default(),
            timing: Timing {
                settle_us: config.tx_settle_us,
                wake_delay_ms: config.peer_wake_delay_ms,
                release_timeout_ms: config.peer_release_timeout_ms,
            },
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Last contents of a send buffer.
    pub fn buffer(&self, class: SendClass) -> &Envelope {
        &self.buffers[class.index()]
    }

    /// Wait for the previous transfer, then hand out a zeroed buffer
    /// stamped with `message_type`.
    pub fn acquire_send_buffer(
        &mut self,
        class: SendClass,
        message_type: MessageType,
        ports: &mut Ports<'_>,
    ) -> &mut Envelope {
        if self.wait_idle(ports).is_err() {
            warn!("LINK: previous transfer never completed, reusing {class:?} buffer");
        }
        let buf = &mut self.buffers[class.index()];
        buf.reset(message_type);
        buf
    }

    /// Launch the contents of `class`'s buffer.
    pub fn send(&mut self, class: SendClass, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        self.wait_idle(ports)?;

        // DMA receive to ISR entry was measured at 3.5 us
        ports.delay.delay_us(self.timing.settle_us);

        self.wake_peer_if_needed(ports);
        self.wait_peer_release(ports)?;

        let env = &self.buffers[class.index()];
        debug!(
            "LINK: tx {:?} len1={} via {class:?}",
            env.message_type, env.payload_length1
        );
        env.encode_into(&mut self.wire);
        self.link.start_tx(self.wire.as_bytes())
    }

    /// Copy `env` into `class`'s buffer and send it.
    pub fn send_envelope(
        &mut self,
        class: SendClass,
        env: &Envelope,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        if self.wait_idle(ports).is_err() {
            warn!("LINK: overwriting {class:?} buffer with transfer in flight");
        }
        self.buffers[class.index()].clone_from(env);
        self.send(class, ports)
    }

    /// Event with a two-byte payload, on the reply buffer.
    pub fn send_simple_event(
        &mut self,
        event: AuxEvent,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        let buf = self.acquire_send_buffer(SendClass::Reply, MessageType::AuxEvent, ports);
        EventMessage::write(buf, event, &[]);
        self.send(SendClass::Reply, ports)
    }

    /// Arm the receive handoff and the link for the next inbound envelope.
    pub fn begin_receive(&mut self) {
        self.rx.rearm();
        self.link.start_rx();
    }

    /// Block until the in-flight transfer completes.
    pub fn wait_idle(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        let link = &self.link;
        if ports.wait_until(self.timing.release_timeout_ms, |_| !link.tx_busy()) {
            Ok(())
        } else {
            Err(TransportError::LinkFault)
        }
    }

    /// Record that the main MCU has gone to sleep. No wake pulse is sent
    /// before the wake-delay window has elapsed.
    pub fn request_peer_sleep(&mut self, now_ms: u64) {
        self.peer = PeerSleep {
            requested: true,
            wake_not_before_ms: now_ms + u64::from(self.timing.wake_delay_ms),
        };
    }

    pub fn peer_sleep_requested(&self) -> bool {
        self.peer.requested
    }

    // ── Internal ─────────────────────────────────────────────

    fn wake_peer_if_needed(&mut self, ports: &mut Ports<'_>) {
        if !self.peer.requested {
            return;
        }

        // Main MCU may still be on its way down
        while ports.clock.now_ms() < self.peer.wake_not_before_ms {
            ports.radio.service_events();
        }

        ports.platform.enable_main_comms();
        self.begin_receive();

        ports.no_comms.wake_pulse();
        ports.delay.delay_ms(1);
        if !ports.wait_until(self.timing.release_timeout_ms, |p| !p.no_comms.is_asserted()) {
            warn!("LINK: main MCU did not answer wake pulse");
        }
        ports.delay.delay_ms(1);

        self.peer.requested = false;
        info!("LINK: main MCU woken");
    }

    fn wait_peer_release(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        if ports.wait_until(self.timing.release_timeout_ms, |p| !p.no_comms.is_asserted()) {
            Ok(())
        } else {
            warn!(
                "LINK: no-comms held for {} ms, dropping transfer",
                self.timing.release_timeout_ms
            );
            Err(TransportError::PeerUnresponsive)
        }
    }
}
