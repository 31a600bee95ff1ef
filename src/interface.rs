//! Interface identifiers and fixed per-interface storage.
//!
//! Two closed sets of interfaces exist on the aux MCU:
//!
//! ```text
//!  LogicalInterface (main-MCU link)     HidInterface (host-facing)
//!  ┌───────┬───────┬─────────┐          ┌───────┬───────┬────────┐
//!  │  Usb  │  Ble  │  Other  │          │  Usb  │  Ble  │  Ctap  │
//!  └───┬───┴───┬───┴─────────┘          └───┬───┴───┬───┴────────┘
//!      └───────┴── forwarded to host ───────┘       │
//!                                     raw CTAP frames, no packet protocol
//! ```
//!
//! Each owns independent state; [`InterfaceMap`] gives every interface its
//! own slot without any global arrays.

use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A closed enum usable as a key into [`InterfaceMap`].
pub trait Slot: Copy + 'static {
    /// Every key, in slot order.
    const ALL: [Self; 3];

    /// Slot index of this key.
    fn index(self) -> usize;
}

/// Receive class of a message arriving from the main MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalInterface {
    Usb,
    Ble,
    /// Commands, events, FIDO2, BLE control and RNG transfers.
    Other,
}

impl LogicalInterface {
    /// Class for a raw wire `message_type`. Unknown types land in `Other`
    /// so the command processor can flag them.
    pub const fn for_message_type(raw: u16) -> Self {
        match raw {
            0x0000 => Self::Usb,
            0x0001 => Self::Ble,
            _ => Self::Other,
        }
    }

    /// Host-facing interface messages of this class are forwarded to.
    pub const fn host(self) -> Option<HidInterface> {
        match self {
            Self::Usb => Some(HidInterface::Usb),
            Self::Ble => Some(HidInterface::Ble),
            Self::Other => None,
        }
    }
}

impl Slot for LogicalInterface {
    const ALL: [Self; 3] = [Self::Usb, Self::Ble, Self::Other];

    fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for LogicalInterface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Usb => write!(f, "Usb"),
            Self::Ble => write!(f, "Ble"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Host-facing HID endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidInterface {
    Usb,
    Ble,
    /// Raw FIDO2 CTAPHID endpoint over USB.
    Ctap,
}

impl HidInterface {
    /// Interfaces that carry the packet protocol (everything but CTAP).
    pub const PACKETIZED: [Self; 2] = [Self::Usb, Self::Ble];

    /// Whether this endpoint sits on the USB bus.
    pub const fn is_usb(self) -> bool {
        matches!(self, Self::Usb | Self::Ctap)
    }

    /// HID keyboard interface identifier as carried in command payloads.
    pub const fn from_wire(id: u16) -> Self {
        match id {
            0 => Self::Usb,
            1 => Self::Ble,
            _ => Self::Ctap,
        }
    }
}

impl Slot for HidInterface {
    const ALL: [Self; 3] = [Self::Usb, Self::Ble, Self::Ctap];

    fn index(self) -> usize {
        self as usize
    }
}

impl core::fmt::Display for HidInterface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Usb => write!(f, "Usb"),
            Self::Ble => write!(f, "Ble"),
            Self::Ctap => write!(f, "Ctap"),
        }
    }
}

/// Fixed storage with exactly one slot per interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMap<K, T> {
    slots: [T; 3],
    _key: PhantomData<K>,
}

impl<K: Slot, T> InterfaceMap<K, T> {
    /// Build from slots given in `K::ALL` order.
    pub const fn new(slots: [T; 3]) -> Self {
        Self {
            slots,
            _key: PhantomData,
        }
    }

    pub fn from_fn(mut f: impl FnMut(K) -> T) -> Self {
        Self::new(core::array::from_fn(|i| f(K::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        K::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        K::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<K: Slot, T: Default> Default for InterfaceMap<K, T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<K: Slot, T> Index<K> for InterfaceMap<K, T> {
    type Output = T;

    fn index(&self, key: K) -> &T {
        &self.slots[key.index()]
    }
}

impl<K: Slot, T> IndexMut<K> for InterfaceMap<K, T> {
    fn index_mut(&mut self, key: K) -> &mut T {
        &mut self.slots[key.index()]
    }
}
