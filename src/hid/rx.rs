//! Interrupt-to-main-loop handoff for host HID endpoints.
//!
//! Each endpoint is re-armed only after its last packet has been consumed,
//! so a single slot per interface is enough. A packet arriving while the
//! slot is still full overwrites it; the counter records how often.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::frame::FRAME_LEN;
use crate::interface::{HidInterface, InterfaceMap};

#[derive(Clone, Copy)]
struct PacketSlot {
    frame: [u8; FRAME_LEN],
    pending: bool,
    connection_set: bool,
}

impl PacketSlot {
    const fn new() -> Self {
        Self {
            frame: [0; FRAME_LEN],
            pending: false,
            connection_set: false,
        }
    }
}

struct HidRxState {
    slots: InterfaceMap<HidInterface, PacketSlot>,
    overruns: u32,
}

pub struct HidRxChannel {
    state: Mutex<CriticalSectionRawMutex, RefCell<HidRxState>>,
}

impl HidRxChannel {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(HidRxState {
                slots: InterfaceMap::new([PacketSlot::new(); 3]),
                overruns: 0,
            })),
        }
    }

    // ── Interrupt side ───────────────────────────────────────

    /// Endpoint delivered a packet. Short packets are zero-padded.
    pub fn on_packet(&self, iface: HidInterface, bytes: &[u8]) {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.slots[iface].pending {
                s.overruns = s.overruns.wrapping_add(1);
            }
            let slot = &mut s.slots[iface];
            let n = bytes.len().min(FRAME_LEN);
            slot.frame[..n].copy_from_slice(&bytes[..n]);
            slot.frame[n..].fill(0);
            slot.pending = true;
        });
    }

    /// Host (re)selected a configuration or a BLE client subscribed.
    pub fn on_connection_set(&self, iface: HidInterface) {
        self.state
            .lock(|s| s.borrow_mut().slots[iface].connection_set = true);
    }

    // ── Main-loop side ───────────────────────────────────────

    pub fn take_packet(&self, iface: HidInterface) -> Option<[u8; FRAME_LEN]> {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            let slot = &mut s.slots[iface];
            if !slot.pending {
                return None;
            }
            slot.pending = false;
            Some(slot.frame)
        })
    }

    pub fn take_connection_set(&self, iface: HidInterface) -> bool {
        self.state.lock(|s| {
            let mut s = s.borrow_mut();
            core::mem::take(&mut s.slots[iface].connection_set)
        })
    }

    pub fn overruns(&self) -> u32 {
        self.state.lock(|s| s.borrow().overruns)
    }
}

impl Default for HidRxChannel {
    fn default() -> Self {
        Self::new()
    }
}
