//! Aux MCU comms core.
//!
//! Links the aux MCU to the main MCU (fixed 560-byte envelopes over a
//! UART/DMA pipe) and to the host (64-byte HID frames over USB and BLE).
//! Exposes the pure-logic modules for integration testing; every hardware
//! interaction goes through the traits in [`app::ports`] and
//! [`link::AuxLink`].
//!
//! ```text
//!  host ◀─ HID frames ─▶ hid ─▶ link::Transport ─▶ main MCU
//!                         ▲                          │
//!                         └── router ◀─ link::RxChannel
//!                               │
//!                               └─▶ processor (commands) / rpc (replies)
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod comms;
pub mod config;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod hid;
pub mod interface;
pub mod link;
pub mod processor;
pub mod router;
pub mod rpc;

pub use comms::AuxComms;
pub use error::Error;
