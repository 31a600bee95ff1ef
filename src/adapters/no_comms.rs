//! No-comms flow-control line over embedded-hal GPIO.
//!
//! The main MCU drives the sense pin high while it cannot take a
//! transfer (busy or asleep). To wake it, the aux MCU briefly pulls the
//! line low through the pull-up control pin.
//!
//! Boards where the line is not wired report it once via
//! `NoCommsUnavailable`; from then on the line always reads released,
//! after a fixed grace delay that gives the main MCU time to get ready.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::app::ports::NoCommsLine;

/// Grace delay per check once the line is known to be absent.
const UNAVAILABLE_GRACE_MS: u32 = 1000;
/// Width of the wake pulse.
const WAKE_PULSE_MS: u32 = 1;

pub struct PinNoCommsLine<I, O, D> {
    sense: I,
    pull: O,
    delay: D,
    unavailable: bool,
}

impl<I, O, D> PinNoCommsLine<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    pub fn new(sense: I, mut pull: O, delay: D) -> Self {
        if pull.set_high().is_err() {
            warn!("NOCOMMS: pull-up control pin not driven");
        }
        Self {
            sense,
            pull,
            delay,
            unavailable: false,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn release(self) -> (I, O, D) {
        (self.sense, self.pull, self.delay)
    }
}

impl<I, O, D> NoCommsLine for PinNoCommsLine<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    fn is_asserted(&mut self) -> bool {
        if self.unavailable {
            self.delay.delay_ms(UNAVAILABLE_GRACE_MS);
            return false;
        }
        match self.sense.is_high() {
            Ok(high) => high,
            Err(_) => {
                warn!("NOCOMMS: sense pin read failed");
                false
            }
        }
    }

    fn wake_pulse(&mut self) {
        if self.unavailable {
            return;
        }
        let low = self.pull.set_low();
        self.delay.delay_ms(WAKE_PULSE_MS);
        let high = self.pull.set_high();
        if low.is_err() || high.is_err() {
            warn!("NOCOMMS: wake pulse not generated");
        }
    }

    fn set_unavailable(&mut self) {
        info!("NOCOMMS: line reported absent");
        self.unavailable = true;
    }
}
