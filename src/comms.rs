//! `AuxComms`: the comms core facade owned by the aux firmware's main loop.
//!
//! ```text
//!               ┌────────────────────────── AuxComms ───────────────────────────┐
//!  RxChannel ──▶│ Router ──▶ Dispatcher ──┬─▶ CommsCore::process (commands)      │
//!               │                         ├─▶ HidStack::send_message (to host)  │
//!               │                         └─▶ Transport::send(Request) (retry)  │
//! HidRxChannel ▶│ HidStack::poll ─────────────▶ Transport::send(Forward)        │
//!               └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The facade owns every piece of main-loop state; the interrupt handoffs
//! ([`RxChannel`], [`HidRxChannel`]) and [`Diagnostics`] are borrowed so
//! they can live in `static`s. Collaborators are passed per call as
//! [`Ports`].

use log::{info, warn};

use crate::app::ports::Ports;
use crate::config::LinkConfig;
use crate::diagnostics::{DiagFlag, Diagnostics};
use crate::envelope::codes::AuxEvent;
use crate::envelope::{Envelope, MessageType, RawEnvelope};
use crate::error::{ConfigError, EnvelopeError, HidError, TransportError};
use crate::hid::{HidRxChannel, HidStack};
use crate::interface::HidInterface;
use crate::link::{AuxLink, RxChannel, SendClass, Transport};
use crate::router::{Dispatch, Router};

/// State shared by the command processor, the RPC helper and the HID side.
pub struct CommsCore<'r, L: AuxLink> {
    pub(crate) transport: Transport<'r, L>,
    pub(crate) hid: HidStack,
    pub(crate) config: LinkConfig,
    pub(crate) diag: &'r Diagnostics,
    pub(crate) rx: &'r RxChannel,
}

impl<L: AuxLink> CommsCore<'_, L> {
    /// Latch the invalid-message flag for the next status poll.
    pub(crate) fn flag_invalid(&self, what: &str, code: u16) {
        warn!("CMD: unknown {what} 0x{code:04x}");
        self.diag.set(DiagFlag::InvalidMessage);
    }
}

/// Routes messages from the router into the core for one poll.
pub(crate) struct Dispatcher<'a, 'r, 'p, L: AuxLink> {
    pub(crate) core: &'a mut CommsCore<'r, L>,
    pub(crate) ports: &'a mut Ports<'p>,
}

impl<L: AuxLink> Dispatch for Dispatcher<'_, '_, '_, L> {
    fn forward_to_host(&mut self, iface: HidInterface, env: &Envelope) {
        if let Err(e) = self.core.hid.send_message(iface, env, self.ports) {
            info!("HID[{iface}]: reply to host dropped: {e}");
        }
    }

    fn process(&mut self, raw: &RawEnvelope) {
        self.core.process(raw, self.ports);
    }

    fn resend_request(&mut self) {
        if let Err(e) = self.core.transport.send(SendClass::Request, self.ports) {
            warn!("RPC: resend failed: {e}");
        }
    }

    fn reject(&mut self, err: EnvelopeError) {
        warn!("ROUTER: dropping {err}");
        self.core.diag.set(DiagFlag::InvalidMessage);
    }
}

pub struct AuxComms<'r, L: AuxLink> {
    pub(crate) router: Router,
    pub(crate) core: CommsCore<'r, L>,
    hid_rx: &'r HidRxChannel,
}

impl<'r, L: AuxLink> AuxComms<'r, L> {
    pub fn new(
        link: L,
        rx: &'r RxChannel,
        hid_rx: &'r HidRxChannel,
        diag: &'r Diagnostics,
        config: LinkConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            router: Router::new(config.early_dispatch_margin),
            core: CommsCore {
                transport: Transport::new(link, rx, &config),
                hid: HidStack::new(&config),
                config,
                diag,
                rx,
            },
            hid_rx,
        })
    }

    /// Arm the first inbound transfer. Call once at boot.
    pub fn init_rx(&mut self) {
        self.core.transport.begin_receive();
        info!("LINK: receive armed");
    }

    /// One main-loop iteration: route main-MCU traffic, then run the HID
    /// routine.
    pub fn tick(&mut self, ports: &mut Ports<'_>) {
        self.poll_router(ports);
        self.core
            .hid
            .poll(self.hid_rx, &mut self.core.transport, ports);
    }

    /// Route whatever the main MCU has sent so far.
    pub fn poll_router(&mut self, ports: &mut Ports<'_>) {
        let rx = self.core.rx;
        let mut sink = Dispatcher {
            core: &mut self.core,
            ports,
        };
        self.router.poll(rx, &mut sink);
    }

    // ── Outbound entry points for collaborators ──────────────

    pub fn acquire_send_buffer(
        &mut self,
        class: SendClass,
        message_type: MessageType,
        ports: &mut Ports<'_>,
    ) -> &mut Envelope {
        self.core
            .transport
            .acquire_send_buffer(class, message_type, ports)
    }

    pub fn send(&mut self, class: SendClass, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        self.core.transport.send(class, ports)
    }

    pub fn send_simple_event(
        &mut self,
        event: AuxEvent,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        self.core.transport.send_simple_event(event, ports)
    }

    /// Packetize an envelope to a host interface.
    pub fn send_to_host(
        &self,
        iface: HidInterface,
        env: &Envelope,
        ports: &mut Ports<'_>,
    ) -> Result<(), HidError> {
        self.core.hid.send_message(iface, env, ports)
    }

    // ── Inspection ───────────────────────────────────────────

    pub fn transport(&self) -> &Transport<'r, L> {
        &self.core.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<'r, L> {
        &mut self.core.transport
    }

    pub fn hid(&self) -> &HidStack {
        &self.core.hid
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &LinkConfig {
        &self.core.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.core.diag
    }
}
