//! Host HID side: USB and BLE keyboard/vendor endpoints plus CTAPHID.
//!
//! ```text
//!   host ──64B──▶ HidRxChannel ──▶ Reassembler[Usb|Ble] ──▶ Transport(Forward) ──▶ main MCU
//!                      │                     │
//!                      │ Ctap                └─ GET_DEVICE_STATUS answered from cache
//!                      ▼
//!                 Fido2Port
//!
//!   main MCU ──▶ Router ──▶ HidStack::send_message ──▶ packets() ──▶ HidPort
//! ```
//!
//! [`HidStack::poll`] is the per-tick USB routine: it reacts to connection
//! changes, reports enumeration and prolonged idle to the main MCU, pushes
//! fresh device status to connected hosts and drains received packets.

pub mod frame;
pub mod packetizer;
pub mod reassembler;
pub mod rx;

pub use frame::{FRAME_LEN, FRAME_PAYLOAD_LEN, FrameHeader};
pub use packetizer::packets;
pub use reassembler::{Feed, Reassembler};
pub use rx::HidRxChannel;

use log::{debug, info, warn};

use crate::app::ports::Ports;
use crate::config::LinkConfig;
use crate::envelope::codes::{AuxEvent, HID_CMD_GET_DEVICE_STATUS};
use crate::envelope::payload::HidMessage;
use crate::envelope::{Envelope, MessageType, Payload};
use crate::error::HidError;
use crate::interface::{HidInterface, Slot};
use crate::link::{AuxLink, SendClass, Transport};

/// Size of the device-status blob pushed by the main MCU.
pub const DEVICE_STATUS_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Timing {
    ble_send_timeout_ms: u32,
    usb_activity_timeout_ms: u32,
    usb_idle_report_ms: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct UsbState {
    enumerated: bool,
    just_enumerated: bool,
    timeout_reported: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct DeviceStatusCache {
    bytes: [u8; DEVICE_STATUS_LEN],
    fresh: bool,
}

pub struct HidStack {
    usb: Reassembler,
    ble: Reassembler,
    usb_state: UsbState,
    status: DeviceStatusCache,
    scratch: Envelope,
    timing: Timing,
}

impl HidStack {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            usb: Reassembler::new(MessageType::Usb),
            ble: Reassembler::new(MessageType::Ble),
            usb_state: UsbState::default(),
            status: DeviceStatusCache::default(),
            scratch: Envelope::new(MessageType::Usb),
            timing: Timing {
                ble_send_timeout_ms: config.ble_send_timeout_ms,
                usb_activity_timeout_ms: config.usb_activity_timeout_ms,
                usb_idle_report_ms: config.usb_idle_report_ms,
            },
        }
    }

    fn reassembler(&mut self, iface: HidInterface) -> Option<&mut Reassembler> {
        match iface {
            HidInterface::Usb => Some(&mut self.usb),
            HidInterface::Ble => Some(&mut self.ble),
            HidInterface::Ctap => None,
        }
    }

    pub fn usb_enumerated(&self) -> bool {
        self.usb_state.enumerated
    }

    pub fn clear_enumerated(&mut self) {
        self.usb_state.enumerated = false;
    }

    /// Store the status blob and schedule a push to connected hosts.
    pub fn update_status_cache(&mut self, bytes: [u8; DEVICE_STATUS_LEN]) {
        self.status = DeviceStatusCache { bytes, fresh: true };
    }

    pub fn cached_status(&self) -> [u8; DEVICE_STATUS_LEN] {
        self.status.bytes
    }

    /// Host selected a configuration (USB) or a client connected (BLE).
    pub fn on_connection_set(&mut self, iface: HidInterface) {
        if let Some(r) = self.reassembler(iface) {
            r.reset_all();
        }
        if iface.is_usb() {
            self.usb_state = UsbState {
                enumerated: true,
                just_enumerated: true,
                timeout_reported: false,
            };
        }
        info!("HID[{iface}]: connection set");
    }

    // ── Send path ────────────────────────────────────────────

    /// Packetize `env`'s payload and send it to the host on `iface`.
    pub fn send_message(
        &self,
        iface: HidInterface,
        env: &Envelope,
        ports: &mut Ports<'_>,
    ) -> Result<(), HidError> {
        for frame in packets(env.body()) {
            self.wait_endpoint(iface, ports)?;
            ports.hid.start_send(iface, &frame)?;
        }
        self.wait_endpoint(iface, ports)
    }

    /// Wait for the previous frame on `iface` to leave.
    fn wait_endpoint(&self, iface: HidInterface, ports: &mut Ports<'_>) -> Result<(), HidError> {
        match iface {
            HidInterface::Ble => {
                if ports.wait_until(self.timing.ble_send_timeout_ms, |p| !p.hid.tx_busy(iface)) {
                    Ok(())
                } else {
                    warn!("HID[{iface}]: send timed out");
                    Err(HidError::SendTimeout)
                }
            }
            HidInterface::Usb | HidInterface::Ctap => loop {
                if !ports.hid.tx_busy(iface) {
                    return Ok(());
                }
                if !ports.hid.usb_configured()
                    || ports.hid.ms_since_usb_activity() > self.timing.usb_activity_timeout_ms
                {
                    warn!("HID[{iface}]: link down, aborting send");
                    return Err(HidError::Disconnected);
                }
                ports.radio.service_events();
            },
        }
    }

    // ── Per-tick routine ─────────────────────────────────────

    pub fn poll<L: AuxLink>(
        &mut self,
        rx: &HidRxChannel,
        transport: &mut Transport<'_, L>,
        ports: &mut Ports<'_>,
    ) {
        for iface in HidInterface::PACKETIZED {
            if rx.take_connection_set(iface) {
                self.on_connection_set(iface);
            }
        }

        if self.usb_state.just_enumerated {
            if let Err(e) = transport.send_simple_event(AuxEvent::UsbEnumerated, ports) {
                warn!("HID[Usb]: enumeration report failed: {e}");
            }
            ports.hid.arm_receive(HidInterface::Usb);
            ports.hid.arm_receive(HidInterface::Ctap);
            self.usb_state.just_enumerated = false;
        }

        if !self.usb_state.timeout_reported
            && self.usb_state.enumerated
            && ports.hid.ms_since_usb_activity() > self.timing.usb_idle_report_ms
        {
            info!("HID[Usb]: host idle, reporting timeout");
            if let Err(e) = transport.send_simple_event(AuxEvent::UsbTimeout, ports) {
                warn!("HID[Usb]: timeout report failed: {e}");
            }
            self.usb_state.timeout_reported = true;
        }

        if self.status.fresh {
            self.push_device_status(ports);
        }

        for iface in HidInterface::ALL {
            if let Some(frame) = rx.take_packet(iface) {
                self.on_frame(iface, &frame, transport, ports);
            }
        }
    }

    fn push_device_status(&mut self, ports: &mut Ports<'_>) {
        self.status.fresh = false;
        let mut msg = Envelope::new(MessageType::Usb);
        HidMessage::write(&mut msg, HID_CMD_GET_DEVICE_STATUS, &self.status.bytes);

        if self.usb_state.enumerated {
            if let Err(e) = self.send_message(HidInterface::Usb, &msg, ports) {
                debug!("HID[Usb]: status push dropped: {e}");
            }
        }
        if ports.radio.can_talk_to_host() {
            if let Err(e) = self.send_message(HidInterface::Ble, &msg, ports) {
                debug!("HID[Ble]: status push dropped: {e}");
            }
        }
    }

    fn on_frame<L: AuxLink>(
        &mut self,
        iface: HidInterface,
        frame: &[u8; FRAME_LEN],
        transport: &mut Transport<'_, L>,
        ports: &mut Ports<'_>,
    ) {
        let Some(reassembler) = self.reassembler(iface) else {
            ports.fido2.handle_ctap_frame(frame);
            ports.hid.arm_receive(iface);
            return;
        };

        let ack = match reassembler.feed(frame) {
            Feed::Complete { ack } => ack,
            Feed::Pending | Feed::Discarded | Feed::Reset => {
                ports.hid.arm_receive(iface);
                return;
            }
        };

        if ack {
            let echoed = self
                .wait_endpoint(iface, ports)
                .and_then(|()| ports.hid.start_send(iface, frame));
            if let Err(e) = echoed {
                debug!("HID[{iface}]: ack echo dropped: {e}");
            }
        }

        let completed = match iface {
            HidInterface::Ble => &self.ble,
            _ => &self.usb,
        };
        self.scratch.clone_from(completed.message());

        let is_status_query = matches!(
            self.scratch.payload(),
            Payload::Hid(HidMessage { cmd: HID_CMD_GET_DEVICE_STATUS, .. })
        );

        if is_status_query {
            let mut reply = Envelope::new(self.scratch.message_type);
            HidMessage::write(&mut reply, HID_CMD_GET_DEVICE_STATUS, &self.status.bytes);
            if let Err(e) = self.send_message(iface, &reply, ports) {
                debug!("HID[{iface}]: status reply dropped: {e}");
            }
        } else {
            debug!(
                "HID[{iface}]: forwarding {} bytes to main MCU",
                self.scratch.payload_length1
            );
            if let Err(e) = transport.send_envelope(SendClass::Forward, &self.scratch, ports) {
                warn!("HID[{iface}]: forward failed: {e}");
            }
        }

        ports.hid.arm_receive(iface);
    }
}
