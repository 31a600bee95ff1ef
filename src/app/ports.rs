//! Port traits: the hexagonal boundary between the comms core and the rest
//! of the aux firmware.
//!
//! ```text
//!   Collaborator ──▶ Port trait ──▶ AuxComms (router / processor / RPC)
//! ```
//!
//! The BLE stack, NiMH charge loop, keyboard typing, FIDO2 logic and the
//! platform layer implement these traits. The comms core only ever sees
//! them through [`Ports`], a per-call bundle of borrowed trait objects, so
//! it never touches hardware directly and is fully testable on the host.

use embedded_hal::delay::DelayNs;

use crate::error::{HidError, KeyboardError};
use crate::interface::HidInterface;

// ───────────────────────────────────────────────────────────────
// Battery (NiMH charge loop)
// ───────────────────────────────────────────────────────────────

/// Charge algorithm requested by the main MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeScheme {
    Nimh23C,
    SlowStart23C,
    Recovery23C,
}

pub trait BatteryPort {
    /// Start ADC conversions so a later charge can begin immediately.
    fn start_using_adc(&mut self);
    fn stop_using_adc(&mut self);

    fn start_charging(&mut self, scheme: ChargeScheme);
    fn stop_charging(&mut self);

    fn charging_status(&self) -> u16;
    /// Battery voltage (ADC counts).
    fn battery_voltage(&self) -> u16;
    fn charging_current(&self) -> i16;
    fn stepdown_voltage(&self) -> u16;
    fn dac_data_register(&self) -> u16;

    /// Debug: hold the step-down at a fixed voltage (mV).
    fn debug_force_charge_voltage(&mut self, millivolts: u16);
    fn debug_stop_charge(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Charge path analog front end (functional test only)
// ───────────────────────────────────────────────────────────────

/// One current-sense conversion: voltages on either side of the shunt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentSense {
    pub high: i16,
    pub low: i16,
}

pub trait ChargePathPort {
    /// Use the high-side sense pin to discharge the step-down output cap.
    fn set_high_sense_as_pull_down(&mut self);
    fn set_high_sense_as_sense(&mut self);

    /// Block until a conversion is ready and return it.
    fn read_current_sense(&mut self) -> CurrentSense;

    fn enable_step_down(&mut self, millivolts: u16);
    fn update_step_down(&mut self, millivolts: u16);
    fn disable_step_down(&mut self);

    fn enable_charge_mosfets(&mut self);
    fn disable_charge_mosfets(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Radio (BLE stack)
// ───────────────────────────────────────────────────────────────

pub trait RadioPort {
    fn is_enabled(&self) -> bool;

    /// SDK library version compiled in, as `(major, minor)`.
    fn sdk_version(&self) -> (u16, u16);
    /// Radio firmware version, `None` if the chip does not answer.
    fn firmware_version(&mut self) -> Option<u32>;
    fn rf_version(&mut self) -> u32;
    fn chip_id(&mut self) -> u32;
    fn address(&mut self) -> [u8; 6];

    /// Schedule the radio to be enabled with the given configuration blob.
    fn set_to_be_enabled(&mut self, config: &[u8]);
    fn set_disable_flag(&mut self);
    fn clear_bonding_information(&mut self);
    fn set_open_to_pairing(&mut self, open: bool);
    /// Ban the connected device until the next one connects.
    /// Returns `false` when nothing was connected.
    fn temporarily_ban_connected_device(&mut self) -> bool;
    fn set_battery_level(&mut self, percent: u8);
    fn can_talk_to_host(&self) -> bool;

    /// Bring the radio up with a fixed MAC (functional test).
    fn start(&mut self, mac: &[u8; 6]);
    fn dtm_rx(&mut self, channel: u16);
    fn tx_tone(&mut self, frequency: u16, length: u16, pattern: u16);
    fn stop_tone(&mut self);

    /// Run pending stack events. Called from every wait loop.
    fn service_events(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Keyboard typing
// ───────────────────────────────────────────────────────────────

pub trait KeyboardPort {
    /// Press and release one key with modifiers, then wait `delay_ms`.
    fn type_key_with_modifier(
        &mut self,
        iface: HidInterface,
        key: u8,
        modifier: u8,
        delay_ms: u16,
    ) -> Result<(), KeyboardError>;

    /// Win+L, with `delay_ms` between reports.
    fn type_lock_shortcut(&mut self, iface: HidInterface, delay_ms: u8);
}

// ───────────────────────────────────────────────────────────────
// HID endpoints
// ───────────────────────────────────────────────────────────────

pub trait HidPort {
    /// USB configuration selected by the host.
    fn usb_configured(&self) -> bool;
    fn ms_since_usb_activity(&self) -> u32;

    fn tx_busy(&self, iface: HidInterface) -> bool;
    /// Start sending one frame; completion is reported via `tx_busy`.
    fn start_send(&mut self, iface: HidInterface, frame: &[u8]) -> Result<(), HidError>;
    fn arm_receive(&mut self, iface: HidInterface);

    fn attach_usb(&mut self);
    fn detach_usb(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Platform
// ───────────────────────────────────────────────────────────────

pub trait PlatformPort {
    fn firmware_version(&self) -> (u16, u16);
    fn device_id(&self) -> u32;
    fn unique_id(&self) -> [u32; 4];
    fn stack_low_watermark(&self) -> u32;

    /// Read and clear the "too many callback timers requested" flag.
    fn take_too_many_timers_flag(&mut self) -> bool;

    /// Persist the flag that makes the next boot enter the bootloader.
    fn set_bootloader_flag(&mut self);
    /// Never returns on hardware; mocks record the call.
    fn system_reset(&mut self);

    fn enable_main_comms(&mut self);
    fn disable_main_comms(&mut self);
    /// Standby until the main MCU wakes us.
    fn standby_sleep(&mut self);
}

// ───────────────────────────────────────────────────────────────
// FIDO2 / CTAPHID
// ───────────────────────────────────────────────────────────────

pub trait Fido2Port {
    /// Hand one raw CTAPHID frame to the FIDO2 logic.
    fn handle_ctap_frame(&mut self, frame: &[u8; 64]);
}

// ───────────────────────────────────────────────────────────────
// No-comms flow-control line
// ───────────────────────────────────────────────────────────────

pub trait NoCommsLine {
    /// Main MCU is busy or asleep; do not start a transfer.
    fn is_asserted(&mut self) -> bool;
    /// Pulse the line to wake the main MCU.
    fn wake_pulse(&mut self);
    /// Main MCU reported the line is not wired; stop honouring it.
    fn set_unavailable(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

pub trait Clock {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Bundle
// ───────────────────────────────────────────────────────────────

/// Every collaborator the comms core needs, borrowed for one call.
pub struct Ports<'a> {
    pub battery: &'a mut dyn BatteryPort,
    pub charge_path: &'a mut dyn ChargePathPort,
    pub radio: &'a mut dyn RadioPort,
    pub keyboard: &'a mut dyn KeyboardPort,
    pub hid: &'a mut dyn HidPort,
    pub platform: &'a mut dyn PlatformPort,
    pub fido2: &'a mut dyn Fido2Port,
    pub no_comms: &'a mut dyn NoCommsLine,
    pub clock: &'a dyn Clock,
    pub delay: &'a mut dyn DelayNs,
}

impl Ports<'_> {
    /// Spin until `done` or `timeout_ms` elapses, servicing radio events
    /// every iteration. Returns `false` on timeout.
    pub fn wait_until(&mut self, timeout_ms: u32, mut done: impl FnMut(&mut Self) -> bool) -> bool {
        let deadline = self.clock.now_ms() + u64::from(timeout_ms);
        loop {
            if done(self) {
                return true;
            }
            if self.clock.now_ms() >= deadline {
                return false;
            }
            self.radio.service_events();
        }
    }

    /// Service radio events for `ms` milliseconds.
    pub fn pump_for(&mut self, ms: u32) {
        let deadline = self.clock.now_ms() + u64::from(ms);
        while self.clock.now_ms() < deadline {
            self.radio.service_events();
        }
    }
}
