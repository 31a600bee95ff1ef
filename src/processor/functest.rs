//! Manufacturing functional test: radio bring-up and charge path checks.
//!
//! ```text
//! discharge cap ─▶ start radio ─▶ DTM RX ─▶ 0 V check ─▶ no-leak check
//!      ─▶ ramp step-down until current flows ─▶ shut down ─▶ radio recheck
//! ```
//!
//! The first failing step decides the result code; later steps are
//! skipped, except that a failed ramp still shuts the charge path down
//! and rechecks the radio.

use log::{info, warn};

use crate::app::ports::{CurrentSense, Ports};

/// MAC used while the radio is brought up for the test.
pub const TEST_MAC: [u8; 6] = [0xDE, 0xAD, 0xBE, 0xEF, 0x12, 0x13];

/// DTM RX channel used while the sense pin settles.
const DTM_CHANNEL: u16 = 20;
/// Time given to the sense pin after leaving pull-down mode.
const SETTLE_MS: u32 = 500;

/// High-side sense above this with the step-down off means it is not at 0 V.
const MAX_IDLE_HIGH_SENSE: i16 = 123;
/// High minus low sense above this (about 40 mA) with mosfets open is a leak.
const MAX_LEAK_DELTA: i32 = 100;
/// High minus low sense that ends the ramp (about 54 mA).
const RAMP_END_DELTA: i32 = 100;
/// Low-side sense at which the ramp gives up (about 1.6 V).
const RAMP_MAX_LOW_SENSE: i16 = 2938;

const LEAK_CHECK_MV: u16 = 1800;
const RAMP_START_MV: u16 = 1200;
const RAMP_STEP_MV: u16 = 10;
const RAMP_LIMIT_MV: u16 = 1650;

/// Result byte of the `FunctionalTestDone` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionalTestResult {
    Pass = 0,
    RadioFailure = 1,
    ChargeRampOverVoltage = 2,
    CurrentSenseFault = 3,
}

impl FunctionalTestResult {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

fn radio_alive(ports: &mut Ports<'_>) -> bool {
    ports.radio.sdk_version() != (0, 0) && ports.radio.firmware_version().is_some()
}

fn delta(s: CurrentSense) -> i32 {
    i32::from(s.high) - i32::from(s.low)
}

pub fn run(ports: &mut Ports<'_>) -> FunctionalTestResult {
    // Radio start-up time doubles as step-down cap discharge time
    ports.charge_path.set_high_sense_as_pull_down();

    ports.radio.start(&TEST_MAC);
    if !radio_alive(ports) {
        warn!("FUNCTEST: radio did not start");
        return FunctionalTestResult::RadioFailure;
    }

    ports.radio.dtm_rx(DTM_CHANNEL);

    ports.charge_path.set_high_sense_as_sense();
    ports.pump_for(SETTLE_MS);

    ports.charge_path.read_current_sense();
    let idle = ports.charge_path.read_current_sense();
    if idle.high > MAX_IDLE_HIGH_SENSE {
        ports.charge_path.disable_step_down();
        warn!("FUNCTEST: step-down output not at 0 V ({})", idle.high);
        return FunctionalTestResult::CurrentSenseFault;
    }

    ports.charge_path.enable_step_down(LEAK_CHECK_MV);
    ports.charge_path.read_current_sense();
    let leak = ports.charge_path.read_current_sense();
    if delta(leak) > MAX_LEAK_DELTA {
        ports.charge_path.disable_step_down();
        warn!("FUNCTEST: current with charge mosfets open ({})", delta(leak));
        return FunctionalTestResult::CurrentSenseFault;
    }

    let mut result = FunctionalTestResult::Pass;
    let mut voltage = RAMP_START_MV;
    ports.charge_path.update_step_down(voltage);
    ports.delay.delay_ms(5);
    ports.charge_path.enable_charge_mosfets();
    ports.charge_path.read_current_sense();

    loop {
        let s = ports.charge_path.read_current_sense();
        if s.high > s.low && delta(s) > RAMP_END_DELTA {
            break;
        }
        voltage += RAMP_STEP_MV;
        if s.low >= RAMP_MAX_LOW_SENSE || voltage > RAMP_LIMIT_MV {
            warn!("FUNCTEST: ramp reached {voltage} mV without current");
            result = FunctionalTestResult::ChargeRampOverVoltage;
            break;
        }
        ports.charge_path.update_step_down(voltage);
    }

    ports.charge_path.disable_charge_mosfets();
    ports.delay.delay_ms(1);
    ports.charge_path.disable_step_down();

    if !radio_alive(ports) {
        warn!("FUNCTEST: radio lost during charge test");
        return FunctionalTestResult::RadioFailure;
    }

    info!("FUNCTEST: done, result {result:?}");
    result
}
