//! Auxlink simulator: the aux MCU comms core on a host, driven by a
//! scripted main MCU.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Scripted main MCU                                           │
//! │     │ RX.on_bytes (chunked, like DMA)      ▲ LoopbackLink    │
//! │     ▼                                      │ (sent frames)   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                 AuxComms (lib crate)                   │  │
//! │  │  Router · CommandProcessor · HidStack · RPC            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │     ▲ HID_RX.on_packet                     │ SimHid frames   │
//! │  Scripted host                             ▼                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `auxlink-sim [config.json]`
#![deny(unused_must_use)]

use std::collections::VecDeque;
use std::convert::Infallible;

use anyhow::{Context, Result};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::{debug, info, warn};

use auxlink::adapters::{LoopbackLink, PinNoCommsLine, StdClock, StdDelay};
use auxlink::app::ports::{
    BatteryPort, ChargePathPort, ChargeScheme, CurrentSense, Fido2Port, HidPort, KeyboardPort,
    PlatformPort, Ports, RadioPort,
};
use auxlink::config::LinkConfig;
use auxlink::diagnostics::Diagnostics;
use auxlink::envelope::codes::{AuxEvent, MainCommand};
use auxlink::envelope::payload::CommandMessage;
use auxlink::envelope::{Envelope, MessageType, Payload};
use auxlink::error::{HidError, KeyboardError};
use auxlink::hid::{HidRxChannel, packets};
use auxlink::interface::HidInterface;
use auxlink::link::RxChannel;
use auxlink::rpc::RNG_TRANSFER_LEN;
use auxlink::{AuxComms, Error};

// ── ISR handoff statics ───────────────────────────────────────

static RX: RxChannel = RxChannel::new();
static HID_RX: HidRxChannel = HidRxChannel::new();
static DIAG: Diagnostics = Diagnostics::new();

/// DMA delivers a transfer in pieces of this size.
const DMA_CHUNK: usize = 128;

fn dma_deliver(env: &Envelope) {
    for chunk in env.encode().as_bytes().chunks(DMA_CHUNK) {
        RX.on_bytes(chunk);
    }
}

// ── Simulated collaborators ───────────────────────────────────

#[derive(Default)]
struct SimBattery {
    charging: bool,
}

impl BatteryPort for SimBattery {
    fn start_using_adc(&mut self) {
        debug!("SIM: battery ADC on");
    }
    fn stop_using_adc(&mut self) {
        debug!("SIM: battery ADC off");
    }
    fn start_charging(&mut self, scheme: ChargeScheme) {
        info!("SIM: charging with {scheme:?}");
        self.charging = true;
    }
    fn stop_charging(&mut self) {
        info!("SIM: charge stopped");
        self.charging = false;
    }
    fn charging_status(&self) -> u16 {
        u16::from(self.charging)
    }
    fn battery_voltage(&self) -> u16 {
        1320
    }
    fn charging_current(&self) -> i16 {
        if self.charging { 150 } else { 0 }
    }
    fn stepdown_voltage(&self) -> u16 {
        1450
    }
    fn dac_data_register(&self) -> u16 {
        0x155
    }
    fn debug_force_charge_voltage(&mut self, millivolts: u16) {
        info!("SIM: forcing {millivolts} mV");
    }
    fn debug_stop_charge(&mut self) {
        info!("SIM: force released");
    }
}

/// Charge path at rest: no conduction, nothing on the sense pins.
#[derive(Default)]
struct SimChargePath {
    step_down_mv: Option<u16>,
}

impl ChargePathPort for SimChargePath {
    fn set_high_sense_as_pull_down(&mut self) {}
    fn set_high_sense_as_sense(&mut self) {}
    fn read_current_sense(&mut self) -> CurrentSense {
        let v = self.step_down_mv.map_or(0, |mv| (mv / 2) as i16);
        CurrentSense { high: v, low: v }
    }
    fn enable_step_down(&mut self, millivolts: u16) {
        self.step_down_mv = Some(millivolts);
    }
    fn update_step_down(&mut self, millivolts: u16) {
        self.step_down_mv = Some(millivolts);
    }
    fn disable_step_down(&mut self) {
        self.step_down_mv = None;
    }
    fn enable_charge_mosfets(&mut self) {}
    fn disable_charge_mosfets(&mut self) {}
}

/// Radio stub whose event pump doubles as the scripted main MCU: each
/// service pass delivers one queued envelope over the link.
#[derive(Default)]
struct SimRadio {
    enabled: bool,
    peer: VecDeque<Envelope>,
}

impl RadioPort for SimRadio {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
    fn sdk_version(&self) -> (u16, u16) {
        (4, 2)
    }
    fn firmware_version(&mut self) -> Option<u32> {
        Some(0x5300_0001)
    }
    fn rf_version(&mut self) -> u32 {
        0x0203
    }
    fn chip_id(&mut self) -> u32 {
        0x0BEE_F001
    }
    fn address(&mut self) -> [u8; 6] {
        [0x02, 0xA0, 0x0C, 0x11, 0x22, 0x33]
    }
    fn set_to_be_enabled(&mut self, config: &[u8]) {
        info!("SIM: radio enable, config {:02x?}", &config[..config.len().min(8)]);
        self.enabled = true;
    }
    fn set_disable_flag(&mut self) {
        self.enabled = false;
    }
    fn clear_bonding_information(&mut self) {
        info!("SIM: bonds cleared");
    }
    fn set_open_to_pairing(&mut self, open: bool) {
        info!("SIM: pairing open={open}");
    }
    fn temporarily_ban_connected_device(&mut self) -> bool {
        false
    }
    fn set_battery_level(&mut self, percent: u8) {
        debug!("SIM: battery level {percent}%");
    }
    fn can_talk_to_host(&self) -> bool {
        false
    }
    fn start(&mut self, mac: &[u8; 6]) {
        info!("SIM: radio started as {mac:02x?}");
    }
    fn dtm_rx(&mut self, channel: u16) {
        info!("SIM: DTM rx on channel {channel}");
    }
    fn tx_tone(&mut self, frequency: u16, length: u16, pattern: u16) {
        info!("SIM: tone f={frequency} len={length} pattern={pattern}");
    }
    fn stop_tone(&mut self) {}
    fn service_events(&mut self) {
        if let Some(env) = self.peer.pop_front() {
            debug!("SIM: main MCU sends {:?}", env.message_type);
            dma_deliver(&env);
        }
    }
}

struct SimKeyboard;

impl KeyboardPort for SimKeyboard {
    fn type_key_with_modifier(
        &mut self,
        iface: HidInterface,
        key: u8,
        modifier: u8,
        _delay_ms: u16,
    ) -> Result<(), KeyboardError> {
        debug!("SIM: key {key:#04x} mod {modifier:#04x} on {iface}");
        Ok(())
    }
    fn type_lock_shortcut(&mut self, iface: HidInterface, _delay_ms: u8) {
        info!("SIM: Win+L on {iface}");
    }
}

#[derive(Default)]
struct SimHid {
    frames_out: usize,
}

impl HidPort for SimHid {
    fn usb_configured(&self) -> bool {
        true
    }
    fn ms_since_usb_activity(&self) -> u32 {
        0
    }
    fn tx_busy(&self, _iface: HidInterface) -> bool {
        false
    }
    fn start_send(&mut self, iface: HidInterface, frame: &[u8]) -> Result<(), HidError> {
        self.frames_out += 1;
        debug!("SIM: frame to {iface} header {:02x?}", &frame[..2]);
        Ok(())
    }
    fn arm_receive(&mut self, _iface: HidInterface) {}
    fn attach_usb(&mut self) {
        info!("SIM: USB attached");
    }
    fn detach_usb(&mut self) {
        info!("SIM: USB detached");
    }
}

struct SimPlatform;

impl PlatformPort for SimPlatform {
    fn firmware_version(&self) -> (u16, u16) {
        let major = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
        let minor = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
        (major, minor)
    }
    fn device_id(&self) -> u32 {
        0x1081_0A05
    }
    fn unique_id(&self) -> [u32; 4] {
        [0x5349_4D00, 1, 2, 3]
    }
    fn stack_low_watermark(&self) -> u32 {
        4096
    }
    fn take_too_many_timers_flag(&mut self) -> bool {
        false
    }
    fn set_bootloader_flag(&mut self) {
        warn!("SIM: bootloader flag set");
    }
    fn system_reset(&mut self) {
        warn!("SIM: system reset requested (ignored)");
    }
    fn enable_main_comms(&mut self) {}
    fn disable_main_comms(&mut self) {}
    fn standby_sleep(&mut self) {
        info!("SIM: standby");
    }
}

struct SimFido2;

impl Fido2Port for SimFido2 {
    fn handle_ctap_frame(&mut self, frame: &[u8; 64]) {
        debug!("SIM: CTAPHID frame {:02x?}", &frame[..8]);
    }
}

/// Fixed-level GPIO for the simulated no-comms line.
struct SimPin(bool);

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0)
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0)
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0 = false;
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0 = true;
        Ok(())
    }
}

struct SimBoard {
    battery: SimBattery,
    charge_path: SimChargePath,
    radio: SimRadio,
    keyboard: SimKeyboard,
    hid: SimHid,
    platform: SimPlatform,
    fido2: SimFido2,
    no_comms: PinNoCommsLine<SimPin, SimPin, StdDelay>,
    clock: StdClock,
    delay: StdDelay,
}

impl SimBoard {
    fn new() -> Self {
        Self {
            battery: SimBattery::default(),
            charge_path: SimChargePath::default(),
            radio: SimRadio::default(),
            keyboard: SimKeyboard,
            hid: SimHid::default(),
            platform: SimPlatform,
            fido2: SimFido2,
            no_comms: PinNoCommsLine::new(SimPin(false), SimPin(true), StdDelay),
            clock: StdClock::new(),
            delay: StdDelay,
        }
    }

    fn ports(&mut self) -> Ports<'_> {
        Ports {
            battery: &mut self.battery,
            charge_path: &mut self.charge_path,
            radio: &mut self.radio,
            keyboard: &mut self.keyboard,
            hid: &mut self.hid,
            platform: &mut self.platform,
            fido2: &mut self.fido2,
            no_comms: &mut self.no_comms,
            clock: &self.clock,
            delay: &mut self.delay,
        }
    }
}

// ── Peer side helpers ─────────────────────────────────────────

/// Log and discard everything the aux MCU sent since the last call.
fn drain_sent(comms: &mut AuxComms<'_, LoopbackLink>) -> usize {
    let sent = comms.transport_mut().link_mut().take_sent();
    for frame in &sent {
        match frame {
            Ok(env) => match env.payload() {
                Payload::Event(ev) => match AuxEvent::try_from(ev.event_id) {
                    Ok(event) => info!("SIM: <- event {event:?}"),
                    Err(raw) => warn!("SIM: <- unknown event {raw:#06x}"),
                },
                _ => info!(
                    "SIM: <- {:?} ({} bytes)",
                    env.message_type, env.payload_length1
                ),
            },
            Err(e) => warn!("SIM: <- undecodable frame: {e}"),
        }
    }
    sent.len()
}

fn command(cmd: MainCommand, args: &[u8]) -> Envelope {
    let mut env = Envelope::new(MessageType::MainCommand);
    CommandMessage::write(&mut env, cmd.code(), args);
    env
}

fn load_config() -> Result<LinkConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(LinkConfig::default());
    };
    let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    let config = LinkConfig::from_json(&bytes)
        .map_err(Error::from)
        .with_context(|| format!("parsing {path}"))?;
    info!("Config loaded from {path}");
    Ok(config)
}

// ── Entry point ───────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Auxlink simulator v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config()?;

    // ── 3. Board and comms core ───────────────────────────────
    let mut board = SimBoard::new();
    let mut comms =
        AuxComms::new(LoopbackLink::new(), &RX, &HID_RX, &DIAG, config).map_err(Error::from)?;
    comms.init_rx();

    // ── 4. USB enumeration ────────────────────────────────────
    HID_RX.on_connection_set(HidInterface::Usb);
    comms.tick(&mut board.ports());
    drain_sent(&mut comms);

    // ── 5. Main MCU traffic ───────────────────────────────────
    let mut ping = Envelope::new(MessageType::PingWithInfo);
    ping.payload_length1 = 1;
    let mut details = Envelope::new(MessageType::PlatformDetails);
    details.payload_length1 = 1;

    for env in [
        ping,
        command(MainCommand::GetStatus, &[]),
        details,
        command(MainCommand::SetBatteryLevel, &[87]),
    ] {
        info!("SIM: -> {:?}", env.message_type);
        dma_deliver(&env);
        comms.tick(&mut board.ports());
        drain_sent(&mut comms);
    }

    // ── 6. Host message forwarded to the main MCU ─────────────
    let body: Vec<u8> = (0..200u8).collect();
    for frame in packets(&body) {
        HID_RX.on_packet(HidInterface::Usb, &frame);
        comms.tick(&mut board.ports());
    }
    drain_sent(&mut comms);

    // ── 7. Blocking RNG fetch ─────────────────────────────────
    let mut reply = Envelope::new(MessageType::RngTransfer);
    let mut seed = board.clock.uptime_us();
    let noise: Vec<u8> = (0..RNG_TRANSFER_LEN)
        .map(|_| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 56) as u8
        })
        .collect();
    reply.set_body(&noise);
    board.radio.peer.push_back(reply);

    let mut random = [0u8; RNG_TRANSFER_LEN];
    comms
        .fetch_random_bytes(&mut board.ports(), &mut random)
        .map_err(Error::from)?;
    drain_sent(&mut comms);
    info!("SIM: random bytes {random:02x?}");

    // ── 8. Summary ────────────────────────────────────────────
    info!(
        "Done: {} HID frames to host, diag flags {:#04x}, HID overruns {}",
        board.hid.frames_out,
        comms.diagnostics().bits(),
        HID_RX.overruns()
    );
    Ok(())
}
