//! Sticky diagnostic flags reported to the main MCU.
//!
//! Faults seen by the comms core are latched into a bitmask and reported
//! in the `HeresMyStatus` reply to a `GetStatus` command. Reading a flag
//! through [`Diagnostics::take`] clears it, so every fault is reported
//! exactly once.
//!
//! ## Flag lifecycle
//!
//! 1. A condition occurs (unknown command, ADC watchdog interrupt).
//! 2. The corresponding bit is set. Setting an already-set bit is a no-op.
//! 3. `GetStatus` reads and clears every bit in one critical section each.
//!
//! The mask lives behind a critical-section mutex so the ADC watchdog
//! interrupt can set its bit while the main loop is mid-dispatch.

use core::cell::Cell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::warn;

/// A latched diagnostic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DiagFlag {
    /// A message from the main MCU was unknown or malformed.
    InvalidMessage = 0b0000_0001,
    /// The battery ADC window watchdog fired.
    AdcWatchdog = 0b0000_0010,
}

impl DiagFlag {
    /// Return the bitmask for this flag.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DiagFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMessage => write!(f, "invalid message from main MCU"),
            Self::AdcWatchdog => write!(f, "ADC watchdog fired"),
        }
    }
}

/// Latched flag set shared between interrupt and main-loop context.
pub struct Diagnostics {
    flags: Mutex<CriticalSectionRawMutex, Cell<u8>>,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            flags: Mutex::new(Cell::new(0)),
        }
    }

    /// Latch a flag.
    pub fn set(&self, flag: DiagFlag) {
        let was_set = self.flags.lock(|f| {
            let prev = f.get();
            f.set(prev | flag.mask());
            prev & flag.mask() != 0
        });
        if !was_set {
            warn!("DIAG: {flag}");
        }
    }

    /// Read and clear a flag.
    pub fn take(&self, flag: DiagFlag) -> bool {
        self.flags.lock(|f| {
            let prev = f.get();
            f.set(prev & !flag.mask());
            prev & flag.mask() != 0
        })
    }

    /// Check a flag without clearing it.
    pub fn is_set(&self, flag: DiagFlag) -> bool {
        self.flags.lock(|f| f.get() & flag.mask() != 0)
    }

    /// Current bitmask.
    pub fn bits(&self) -> u8 {
        self.flags.lock(Cell::get)
    }

    /// Callable from the ADC watchdog interrupt.
    pub fn flag_adc_watchdog_fired(&self) {
        self.flags
            .lock(|f| f.set(f.get() | DiagFlag::AdcWatchdog.mask()));
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
