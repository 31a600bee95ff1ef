//! Interrupt-to-main-loop handoff for envelopes arriving from the main MCU.
//!
//! ```text
//!  DMA ISR                         RxChannel                        Router
//! ─────────                ┌──────────────────────┐              ──────────
//! on_bytes(chunk) ───────▶ │ in_flight [560]      │ ◀─ try_early_snapshot()
//!                          │ landed               │
//!   560 landed? ─────────▶ │ slot[Usb|Ble|Other]  │ ◀─ take_completed(iface)
//!                          │  buffer, received,   │
//!                          │  answered            │
//!                          └──────────────────────┘
//! ```
//!
//! Every read-modify-write happens inside one critical section, and data
//! leaves the channel only by copy. The interrupt side never blocks.
//!
//! On completion of a transfer the image is copied into its class slot.
//! If the router already acted on that message from its first bytes
//! (`answered`), the flag is cleared and `received` is not raised, so
//! the message is dispatched exactly once.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::envelope::{ENVELOPE_LEN, HEADER_LEN, RawEnvelope};
use crate::interface::{InterfaceMap, LogicalInterface};

struct ClassSlot {
    buffer: RawEnvelope,
    received: bool,
    answered: bool,
}

impl ClassSlot {
    const fn new() -> Self {
        Self {
            buffer: RawEnvelope::zeroed(),
            received: false,
            answered: false,
        }
    }
}

struct RxState {
    in_flight: RawEnvelope,
    landed: usize,
    slots: InterfaceMap<LogicalInterface, ClassSlot>,
}

impl RxState {
    const fn new() -> Self {
        Self {
            in_flight: RawEnvelope::zeroed(),
            landed: 0,
            slots: InterfaceMap::new([ClassSlot::new(), ClassSlot::new(), ClassSlot::new()]),
        }
    }

    fn complete(&mut self) {
        let iface = self.in_flight.interface();
        let slot = &mut self.slots[iface];
        slot.buffer.clone_from(&self.in_flight);
        if slot.answered {
            slot.answered = false;
        } else {
            slot.received = true;
        }
        self.landed = 0;
    }
}

/// Single-producer (ISR) / single-consumer (router) receive handoff.
pub struct RxChannel {
    state: Mutex<CriticalSectionRawMutex, RefCell<RxState>>,
}

impl RxChannel {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(RxState::new())),
        }
    }

    // ── Interrupt side ───────────────────────────────────────

    /// DMA progress: append bytes to the in-flight transfer. Each time 560
    /// bytes have landed the transfer completes and the next one starts.
    pub fn on_bytes(&self, mut bytes: &[u8]) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            while !bytes.is_empty() {
                let at = s.landed;
                let n = bytes.len().min(ENVELOPE_LEN - at);
                s.in_flight.as_bytes_mut()[at..at + n].copy_from_slice(&bytes[..n]);
                s.landed += n;
                bytes = &bytes[n..];
                if s.landed == ENVELOPE_LEN {
                    s.complete();
                }
            }
        });
    }

    // ── Main-loop side ───────────────────────────────────────

    /// If a fully received message is waiting in `iface`'s slot, copy it
    /// into `out` and clear the flag. A message already answered from its
    /// first bytes is dropped here.
    pub fn take_completed(&self, iface: LogicalInterface, out: &mut RawEnvelope) -> bool {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let slot = &mut s.slots[iface];
            if !slot.received {
                return false;
            }
            slot.received = false;
            if slot.answered {
                return false;
            }
            out.clone_from(&slot.buffer);
            true
        })
    }

    /// Snapshot the in-flight transfer if its declared payload has already
    /// landed and more than `margin` bytes are still outstanding.
    ///
    /// On success the landed prefix is copied into `out` (rest zeroed), the
    /// class is marked answered and its interface is returned.
    pub fn try_early_snapshot(&self, margin: usize, out: &mut RawEnvelope) -> Option<LogicalInterface> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let landed = s.landed;
            if landed < HEADER_LEN {
                return None;
            }
            let iface = s.in_flight.interface();
            let needed = HEADER_LEN + usize::from(s.in_flight.payload_length1());
            let slot = &s.slots[iface];
            if landed < needed
                || slot.answered
                || ENVELOPE_LEN - landed <= margin
                || slot.received
            {
                return None;
            }
            out.fill_from_prefix(&s.in_flight.as_bytes()[..landed]);
            s.slots[iface].answered = true;
            Some(iface)
        })
    }

    /// The current `iface` message was handled from its first bytes and the
    /// rest of it has not landed yet.
    pub fn answered_early(&self, iface: LogicalInterface) -> bool {
        self.state.lock(|s| s.borrow().slots[iface].answered)
    }

    /// Restart the in-flight transfer from byte zero.
    ///
    /// Early answers belong to the abandoned transfer and are dropped with
    /// it. Completed messages stay queued.
    pub fn rearm(&self) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            s.landed = 0;
            s.in_flight.clear();
            for (_, slot) in s.slots.iter_mut() {
                slot.answered = false;
            }
        });
    }

    pub fn bytes_landed(&self) -> usize {
        self.state.lock(|s| s.borrow().landed)
    }
}

impl Default for RxChannel {
    fn default() -> Self {
        Self::new()
    }
}
