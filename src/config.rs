//! Link configuration parameters
//!
//! Timeouts and thresholds for the main-MCU link, the blocking RPC helper
//! and the host-facing HID interfaces. Values can be overridden from a JSON
//! document (the host simulator does this); firmware builds use the defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Core link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Blocking RPC ---
    /// Deadline for device-internal queries to the main MCU (milliseconds)
    pub main_wait_timeout_ms: u32,
    /// Deadline for queries that need user interaction (milliseconds)
    pub pin_entry_timeout_ms: u32,

    // --- Router ---
    /// Minimum bytes still outstanding in the in-flight transfer for an
    /// early dispatch to be allowed
    pub early_dispatch_margin: u16,

    // --- Main link ---
    /// Delay between the end of a receive and the next transmit (microseconds)
    pub tx_settle_us: u32,
    /// Window after a sleep request during which no wake pulse is generated (milliseconds)
    pub peer_wake_delay_ms: u32,
    /// How long the main MCU may hold the no-comms line before a send gives up (milliseconds)
    pub peer_release_timeout_ms: u32,

    // --- HID ---
    /// BLE frame send timeout (milliseconds)
    pub ble_send_timeout_ms: u32,
    /// USB bus inactivity after which a send is abandoned (milliseconds)
    pub usb_activity_timeout_ms: u32,
    /// USB bus inactivity after which the main MCU is told the host went away (milliseconds)
    pub usb_idle_report_ms: u32,

    // --- Keyboard ---
    /// Delay between key reports for shortcut typing (milliseconds)
    pub shortcut_key_delay_ms: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Blocking RPC
            main_wait_timeout_ms: 5_000,
            pin_entry_timeout_ms: 60_000, // user types the code

            // Router
            early_dispatch_margin: 200, // bytes

            // Main link
            tx_settle_us: 5, // DMA receive to ISR entry measured at 3.5 us
            peer_wake_delay_ms: 500,
            peer_release_timeout_ms: 1_000,

            // HID
            ble_send_timeout_ms: 3_000,
            usb_activity_timeout_ms: 100,
            usb_idle_report_ms: 65_000,

            // Keyboard
            shortcut_key_delay_ms: 200,
        }
    }
}

impl LinkConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would break the link or make waits unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main_wait_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("main_wait_timeout_ms"));
        }
        if self.pin_entry_timeout_ms < self.main_wait_timeout_ms {
            return Err(ConfigError::ValidationFailed("pin_entry_timeout_ms"));
        }
        if usize::from(self.early_dispatch_margin) >= crate::envelope::ENVELOPE_LEN {
            return Err(ConfigError::ValidationFailed("early_dispatch_margin"));
        }
        if self.peer_release_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("peer_release_timeout_ms"));
        }
        if self.ble_send_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("ble_send_timeout_ms"));
        }
        if self.usb_activity_timeout_ms >= self.usb_idle_report_ms {
            return Err(ConfigError::ValidationFailed("usb_activity_timeout_ms"));
        }
        Ok(())
    }
}
