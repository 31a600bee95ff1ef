//! Mock board for integration tests.
//!
//! Every port records its calls so tests can assert on the full history
//! without real peripherals. The clock advances by one millisecond per
//! read, so every bounded wait in the comms core terminates.
//!
//! [`Harness`] wires a [`MockBoard`] to an [`AuxComms`] over a
//! [`LoopbackLink`] with leaked `'static` handoff channels, the way
//! firmware keeps them in statics.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use auxlink::AuxComms;
use auxlink::adapters::LoopbackLink;
use auxlink::app::ports::{
    BatteryPort, ChargePathPort, ChargeScheme, Clock, CurrentSense, Fido2Port, HidPort,
    KeyboardPort, NoCommsLine, PlatformPort, Ports, RadioPort,
};
use auxlink::config::LinkConfig;
use auxlink::diagnostics::Diagnostics;
use auxlink::envelope::Envelope;
use auxlink::error::{HidError, KeyboardError};
use auxlink::hid::HidRxChannel;
use auxlink::interface::HidInterface;
use auxlink::link::RxChannel;
use embedded_hal::delay::DelayNs;

// ── Time ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + 1);
        t
    }
}

pub struct MockDelay {
    clock: MockClock,
    pub total_us: u64,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_us += u64::from(ns / 1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_us += u64::from(ms) * 1000;
        self.clock.advance(u64::from(ms));
    }
}

// ── Battery ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryCall {
    StartAdc,
    StopAdc,
    StartCharging(ChargeScheme),
    StopCharging,
    ForceVoltage(u16),
    StopForce,
}

#[derive(Default)]
pub struct MockBattery {
    pub calls: Vec<BatteryCall>,
}

impl BatteryPort for MockBattery {
    fn start_using_adc(&mut self) {
        self.calls.push(BatteryCall::StartAdc);
    }
    fn stop_using_adc(&mut self) {
        self.calls.push(BatteryCall::StopAdc);
    }
    fn start_charging(&mut self, scheme: ChargeScheme) {
        self.calls.push(BatteryCall::StartCharging(scheme));
    }
    fn stop_charging(&mut self) {
        self.calls.push(BatteryCall::StopCharging);
    }
    fn charging_status(&self) -> u16 {
        3
    }
    fn battery_voltage(&self) -> u16 {
        1320
    }
    fn charging_current(&self) -> i16 {
        -12
    }
    fn stepdown_voltage(&self) -> u16 {
        1450
    }
    fn dac_data_register(&self) -> u16 {
        0x0155
    }
    fn debug_force_charge_voltage(&mut self, millivolts: u16) {
        self.calls.push(BatteryCall::ForceVoltage(millivolts));
    }
    fn debug_stop_charge(&mut self) {
        self.calls.push(BatteryCall::StopForce);
    }
}

// ── Charge path ───────────────────────────────────────────────

/// Simple electrical model: current flows once the mosfets are closed and
/// the step-down reaches `conduct_at_mv`.
pub struct MockChargePath {
    pub step_down_mv: Option<u16>,
    pub mosfets: bool,
    pub conduct_at_mv: u16,
    pub idle_high: i16,
    pub leak: i16,
    /// Highest voltage reached while ramping.
    pub highest_mv: u16,
}

impl Default for MockChargePath {
    fn default() -> Self {
        Self {
            step_down_mv: None,
            mosfets: false,
            conduct_at_mv: 1300,
            idle_high: 20,
            leak: 0,
            highest_mv: 0,
        }
    }
}

impl ChargePathPort for MockChargePath {
    fn set_high_sense_as_pull_down(&mut self) {}
    fn set_high_sense_as_sense(&mut self) {}

    fn read_current_sense(&mut self) -> CurrentSense {
        match self.step_down_mv {
            None => CurrentSense {
                high: self.idle_high,
                low: 0,
            },
            Some(mv) if self.mosfets && mv >= self.conduct_at_mv => CurrentSense {
                high: 1500,
                low: 1300,
            },
            Some(_) if self.mosfets => CurrentSense {
                high: 1000,
                low: 1000,
            },
            Some(_) => CurrentSense {
                high: 1000 + self.leak,
                low: 1000,
            },
        }
    }

    fn enable_step_down(&mut self, millivolts: u16) {
        self.step_down_mv = Some(millivolts);
    }
    fn update_step_down(&mut self, millivolts: u16) {
        self.step_down_mv = Some(millivolts);
        self.highest_mv = self.highest_mv.max(millivolts);
    }
    fn disable_step_down(&mut self) {
        self.step_down_mv = None;
    }
    fn enable_charge_mosfets(&mut self) {
        self.mosfets = true;
    }
    fn disable_charge_mosfets(&mut self) {
        self.mosfets = false;
    }
}

// ── Radio ─────────────────────────────────────────────────────

pub struct MockRadio {
    pub enabled: bool,
    pub alive: bool,
    pub can_talk: bool,
    pub has_connection: bool,
    pub enable_config: Option<Vec<u8>>,
    pub disable_requested: bool,
    pub bonds_cleared: bool,
    pub open_to_pairing: Option<bool>,
    pub battery_level: Option<u8>,
    pub started_with: Option<[u8; 6]>,
    pub dtm_channels: Vec<u16>,
    pub tones: Vec<(u16, u16, u16)>,
    pub tone_stops: usize,
    pub events_serviced: usize,
    /// Envelopes the scripted main MCU sends while the aux MCU waits.
    pub peer_queue: VecDeque<Envelope>,
    rx: Option<&'static RxChannel>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            enabled: true,
            alive: true,
            can_talk: false,
            has_connection: true,
            enable_config: None,
            disable_requested: false,
            bonds_cleared: false,
            open_to_pairing: None,
            battery_level: None,
            started_with: None,
            dtm_channels: Vec::new(),
            tones: Vec::new(),
            tone_stops: 0,
            events_serviced: 0,
            peer_queue: VecDeque::new(),
            rx: None,
        }
    }
}

impl RadioPort for MockRadio {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
    fn sdk_version(&self) -> (u16, u16) {
        if self.alive { (4, 2) } else { (0, 0) }
    }
    fn firmware_version(&mut self) -> Option<u32> {
        self.alive.then_some(0x5300_1234)
    }
    fn rf_version(&mut self) -> u32 {
        0x0A
    }
    fn chip_id(&mut self) -> u32 {
        0x1F
    }
    fn address(&mut self) -> [u8; 6] {
        [1, 2, 3, 4, 5, 6]
    }
    fn set_to_be_enabled(&mut self, config: &[u8]) {
        self.enable_config = Some(config.to_vec());
    }
    fn set_disable_flag(&mut self) {
        self.disable_requested = true;
    }
    fn clear_bonding_information(&mut self) {
        self.bonds_cleared = true;
    }
    fn set_open_to_pairing(&mut self, open: bool) {
        self.open_to_pairing = Some(open);
    }
    fn temporarily_ban_connected_device(&mut self) -> bool {
        self.has_connection
    }
    fn set_battery_level(&mut self, percent: u8) {
        self.battery_level = Some(percent);
    }
    fn can_talk_to_host(&self) -> bool {
        self.can_talk
    }
    fn start(&mut self, mac: &[u8; 6]) {
        self.started_with = Some(*mac);
    }
    fn dtm_rx(&mut self, channel: u16) {
        self.dtm_channels.push(channel);
    }
    fn tx_tone(&mut self, frequency: u16, length: u16, pattern: u16) {
        self.tones.push((frequency, length, pattern));
    }
    fn stop_tone(&mut self) {
        self.tone_stops += 1;
    }
    fn service_events(&mut self) {
        self.events_serviced += 1;
        if let (Some(rx), Some(env)) = (self.rx, self.peer_queue.pop_front()) {
            rx.on_bytes(env.encode().as_bytes());
        }
    }
}

// ── Keyboard ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockKeyboard {
    pub typed: Vec<(HidInterface, u8, u8)>,
    pub lock_shortcuts: Vec<(HidInterface, u8)>,
    pub fail_after: Option<usize>,
}

impl KeyboardPort for MockKeyboard {
    fn type_key_with_modifier(
        &mut self,
        iface: HidInterface,
        key: u8,
        modifier: u8,
        _delay_ms: u16,
    ) -> Result<(), KeyboardError> {
        if self.fail_after == Some(self.typed.len()) {
            return Err(KeyboardError::ReportFailed);
        }
        self.typed.push((iface, key, modifier));
        Ok(())
    }

    fn type_lock_shortcut(&mut self, iface: HidInterface, delay_ms: u8) {
        self.lock_shortcuts.push((iface, delay_ms));
    }
}

// ── HID endpoints ─────────────────────────────────────────────

pub struct MockHid {
    pub configured: bool,
    pub idle_ms: u32,
    pub busy: bool,
    pub sent: Vec<(HidInterface, [u8; 64])>,
    pub armed: Vec<HidInterface>,
    pub attached: Option<bool>,
}

impl Default for MockHid {
    fn default() -> Self {
        Self {
            configured: true,
            idle_ms: 0,
            busy: false,
            sent: Vec::new(),
            armed: Vec::new(),
            attached: None,
        }
    }
}

impl MockHid {
    pub fn frames_to(&self, iface: HidInterface) -> Vec<[u8; 64]> {
        self.sent
            .iter()
            .filter(|(i, _)| *i == iface)
            .map(|(_, f)| *f)
            .collect()
    }
}

impl HidPort for MockHid {
    fn usb_configured(&self) -> bool {
        self.configured
    }
    fn ms_since_usb_activity(&self) -> u32 {
        self.idle_ms
    }
    fn tx_busy(&self, _iface: HidInterface) -> bool {
        self.busy
    }
    fn start_send(&mut self, iface: HidInterface, frame: &[u8]) -> Result<(), HidError> {
        let mut copy = [0u8; 64];
        copy[..frame.len()].copy_from_slice(frame);
        self.sent.push((iface, copy));
        Ok(())
    }
    fn arm_receive(&mut self, iface: HidInterface) {
        self.armed.push(iface);
    }
    fn attach_usb(&mut self) {
        self.attached = Some(true);
    }
    fn detach_usb(&mut self) {
        self.attached = Some(false);
    }
}

// ── Platform ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    SetBootloaderFlag,
    SystemReset,
    EnableMainComms,
    DisableMainComms,
    StandbySleep,
}

#[derive(Default)]
pub struct MockPlatform {
    pub calls: Vec<PlatformCall>,
    pub too_many_timers: bool,
}

impl PlatformPort for MockPlatform {
    fn firmware_version(&self) -> (u16, u16) {
        (1, 7)
    }
    fn device_id(&self) -> u32 {
        0x1081_0A05
    }
    fn unique_id(&self) -> [u32; 4] {
        [0xA, 0xB, 0xC, 0xD]
    }
    fn stack_low_watermark(&self) -> u32 {
        0x2000_7F00
    }
    fn take_too_many_timers_flag(&mut self) -> bool {
        std::mem::take(&mut self.too_many_timers)
    }
    fn set_bootloader_flag(&mut self) {
        self.calls.push(PlatformCall::SetBootloaderFlag);
    }
    fn system_reset(&mut self) {
        self.calls.push(PlatformCall::SystemReset);
    }
    fn enable_main_comms(&mut self) {
        self.calls.push(PlatformCall::EnableMainComms);
    }
    fn disable_main_comms(&mut self) {
        self.calls.push(PlatformCall::DisableMainComms);
    }
    fn standby_sleep(&mut self) {
        self.calls.push(PlatformCall::StandbySleep);
    }
}

// ── FIDO2 / no-comms ──────────────────────────────────────────

#[derive(Default)]
pub struct MockFido2 {
    pub frames: Vec<[u8; 64]>,
}

impl Fido2Port for MockFido2 {
    fn handle_ctap_frame(&mut self, frame: &[u8; 64]) {
        self.frames.push(*frame);
    }
}

#[derive(Default)]
pub struct MockNoComms {
    pub asserted: bool,
    pub pulses: usize,
    pub unavailable: bool,
}

impl NoCommsLine for MockNoComms {
    fn is_asserted(&mut self) -> bool {
        self.asserted && !self.unavailable
    }
    fn wake_pulse(&mut self) {
        self.pulses += 1;
        // Main MCU wakes and releases the line
        self.asserted = false;
    }
    fn set_unavailable(&mut self) {
        self.unavailable = true;
    }
}

// ── Board ─────────────────────────────────────────────────────

pub struct MockBoard {
    pub battery: MockBattery,
    pub charge_path: MockChargePath,
    pub radio: MockRadio,
    pub keyboard: MockKeyboard,
    pub hid: MockHid,
    pub platform: MockPlatform,
    pub fido2: MockFido2,
    pub no_comms: MockNoComms,
    pub clock: MockClock,
    pub delay: MockDelay,
}

impl MockBoard {
    pub fn new() -> Self {
        let clock = MockClock {
            now: Rc::new(Cell::new(0)),
        };
        Self {
            battery: MockBattery::default(),
            charge_path: MockChargePath::default(),
            radio: MockRadio::default(),
            keyboard: MockKeyboard::default(),
            hid: MockHid::default(),
            platform: MockPlatform::default(),
            fido2: MockFido2::default(),
            no_comms: MockNoComms::default(),
            delay: MockDelay {
                clock: clock.clone(),
                total_us: 0,
            },
            clock,
        }
    }

    pub fn ports(&mut self) -> Ports<'_> {
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

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub comms: AuxComms<'static, LoopbackLink>,
    pub board: MockBoard,
    pub rx: &'static RxChannel,
    pub hid_rx: &'static HidRxChannel,
    pub diag: &'static Diagnostics,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LinkConfig::default())
    }

    pub fn with_config(config: LinkConfig) -> Self {
        let rx: &'static RxChannel = Box::leak(Box::new(RxChannel::new()));
        let hid_rx: &'static HidRxChannel = Box::leak(Box::new(HidRxChannel::new()));
        let diag: &'static Diagnostics = Box::leak(Box::new(Diagnostics::new()));

        let mut comms = AuxComms::new(LoopbackLink::new(), rx, hid_rx, diag, config)
            .expect("test config is valid");
        comms.init_rx();

        let mut board = MockBoard::new();
        board.radio.rx = Some(rx);
        Self {
            comms,
            board,
            rx,
            hid_rx,
            diag,
        }
    }

    /// The main MCU sends a complete envelope.
    pub fn deliver(&self, env: &Envelope) {
        self.rx.on_bytes(env.encode().as_bytes());
    }

    /// Queue an envelope the main MCU sends on the next radio service pass.
    pub fn script_reply(&mut self, env: Envelope) {
        self.board.radio.peer_queue.push_back(env);
    }

    pub fn tick(&mut self) {
        let mut ports = self.board.ports();
        self.comms.tick(&mut ports);
    }

    /// Everything sent to the main MCU since the last call.
    pub fn sent(&mut self) -> Vec<Envelope> {
        self.comms
            .transport_mut()
            .link_mut()
            .take_sent()
            .into_iter()
            .map(|r| r.expect("aux MCU only sends valid envelopes"))
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
