//! Boundary between the comms core and the rest of the aux firmware.
//!
//! Everything the core needs from outside (BLE stack, charge loop,
//! keyboard, HID endpoints, FIDO2, platform, time) is reached through the
//! **port traits** in [`ports`], so the router, processor and RPC helper
//! run unchanged against mocks on the host.

pub mod ports;
