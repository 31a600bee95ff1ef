//! Adapters: concrete implementations of the port traits for host builds.
//!
//! | Adapter    | Implements        | Connects to                     |
//! |------------|-------------------|---------------------------------|
//! | `loopback` | AuxLink           | In-memory frame log             |
//! | `no_comms` | NoCommsLine       | embedded-hal GPIO + delay       |
//! | `time`     | Clock             | `std::time::Instant`            |
//! |            | DelayNs           | `std::thread::sleep`            |
//!
//! Firmware builds provide their own link (UART + DMA) and timer ports;
//! `no_comms` is board-agnostic and works on any embedded-hal 1.0 pins.

pub mod loopback;
pub mod no_comms;
pub mod time;

pub use loopback::LoopbackLink;
pub use no_comms::PinNoCommsLine;
pub use time::{StdClock, StdDelay};
