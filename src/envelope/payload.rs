//! Typed views of the 552-byte payload union.
//!
//! [`Payload`] borrows from an [`Envelope`](super::Envelope) and is selected
//! by its `message_type`. Readers never allocate; writers fill an envelope
//! in place and set `payload_length1`.
//!
//! | Variant          | Layout                                             |
//! |------------------|----------------------------------------------------|
//! | Hid              | `cmd:u16 len:u16 data[548]`                        |
//! | Bootloader       | `command:u16 pad:u16 union{..}` (528 B)            |
//! | Command          | `command:u16 args[550]`                             |
//! | Event            | `event_id:u16 data[550]`                           |
//! | KeyboardType     | `interface:u16 delay_ms:u16 symbols:[u16]` (0-end) |
//! | Fido2            | `sub_type:u16 reserved:u16 body[548]`              |
//! | Ble              | `message_id:u16 data[550]`                         |
//! | Rng              | raw bytes                                          |

use super::codes::AuxEvent;
use super::{Envelope, MessageType, PAYLOAD_LEN};

/// Size of the bootloader message variant.
pub const BOOTLOADER_MESSAGE_LEN: usize = 528;
/// Size of the platform details reply.
pub const PLATFORM_DETAILS_LEN: usize = 56;
/// Size of the NiMH charge status reply.
pub const NIMH_STATUS_LEN: usize = 10;
/// Size of a stored bonding record.
pub const BONDING_INFO_LEN: usize = 132;
/// Bytes of firmware data in a bootloader write.
pub const BOOTLOADER_WRITE_DATA_LEN: usize = 512;

fn le16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn put16(b: &mut [u8], at: usize, v: u16) {
    b[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// Copy `data` after a header of `header` bytes and set `payload_length1`.
fn write_with_header(env: &mut Envelope, header: usize, data: &[u8]) {
    let n = data.len().min(PAYLOAD_LEN - header);
    env.payload[header..header + n].copy_from_slice(&data[..n]);
    env.payload_length1 = (header + n) as u16;
}

// ── Sum type ─────────────────────────────────────────────────

/// Payload variant selected by `message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Hid(HidMessage<'a>),
    Bootloader(BootloaderMessage<'a>),
    /// Request carries no body.
    PlatformDetails,
    Command(CommandMessage<'a>),
    Event(EventMessage<'a>),
    /// Request carries no body.
    NimhCharge,
    PingWithInfo,
    KeyboardType(KeyboardBatch<'a>),
    Fido2(Fido2Message<'a>),
    Rng(&'a [u8]),
    Ble(BleMessage<'a>),
}

impl<'a> Payload<'a> {
    pub fn parse(message_type: MessageType, p: &'a [u8; PAYLOAD_LEN]) -> Self {
        match message_type {
            MessageType::Usb | MessageType::Ble => Self::Hid(HidMessage {
                cmd: le16(p, 0),
                len: le16(p, 2),
                data: &p[4..],
            }),
            MessageType::Bootloader => Self::Bootloader(BootloaderMessage::parse(p)),
            MessageType::PlatformDetails => Self::PlatformDetails,
            MessageType::MainCommand => Self::Command(CommandMessage {
                command: le16(p, 0),
                args: &p[2..],
            }),
            MessageType::AuxEvent => Self::Event(EventMessage {
                event_id: le16(p, 0),
                data: &p[2..],
            }),
            MessageType::NimhCharge => Self::NimhCharge,
            MessageType::PingWithInfo => Self::PingWithInfo,
            MessageType::KeyboardType => Self::KeyboardType(KeyboardBatch {
                interface: le16(p, 0),
                delay_ms: le16(p, 2),
                symbols: &p[4..],
            }),
            MessageType::Fido2 => Self::Fido2(Fido2Message {
                sub_type: le16(p, 0),
                body: &p[4..],
            }),
            MessageType::RngTransfer => Self::Rng(&p[..]),
            MessageType::BleCommand => Self::Ble(BleMessage {
                message_id: le16(p, 0),
                data: &p[2..],
            }),
        }
    }
}

// ── HID forward ──────────────────────────────────────────────

/// Host HID message relayed between the host and the main MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidMessage<'a> {
    pub cmd: u16,
    pub len: u16,
    pub data: &'a [u8],
}

impl HidMessage<'_> {
    pub fn write(env: &mut Envelope, cmd: u16, data: &[u8]) {
        put16(&mut env.payload, 0, cmd);
        let n = data.len().min(PAYLOAD_LEN - 4);
        put16(&mut env.payload, 2, n as u16);
        write_with_header(env, 4, &data[..n]);
    }
}

// ── Bootloader ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootloaderMessage<'a> {
    StartProgramming {
        image_length: u32,
        crc: u32,
    },
    Write {
        size: u32,
        crc: u32,
        address: u32,
        data: &'a [u8],
    },
    StartApp,
    Unknown(u16),
}

impl<'a> BootloaderMessage<'a> {
    fn parse(p: &'a [u8; PAYLOAD_LEN]) -> Self {
        // command:u16, 2 pad bytes, then the u32-aligned union
        match le16(p, 0) {
            0 => Self::StartProgramming {
                image_length: le32(p, 4),
                crc: le32(p, 8),
            },
            1 => Self::Write {
                size: le32(p, 4),
                crc: le32(p, 8),
                address: le32(p, 12),
                data: &p[16..16 + BOOTLOADER_WRITE_DATA_LEN],
            },
            2 => Self::StartApp,
            other => Self::Unknown(other),
        }
    }
}

// ── Generic command / event ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandMessage<'a> {
    pub command: u16,
    pub args: &'a [u8],
}

impl CommandMessage<'_> {
    pub fn arg_u8(&self, index: usize) -> u8 {
        self.args[index]
    }

    pub fn arg_u16(&self, index: usize) -> u16 {
        le16(self.args, index * 2)
    }

    pub fn write(env: &mut Envelope, command: u16, args: &[u8]) {
        put16(&mut env.payload, 0, command);
        write_with_header(env, 2, args);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMessage<'a> {
    pub event_id: u16,
    pub data: &'a [u8],
}

impl EventMessage<'_> {
    pub fn write(env: &mut Envelope, event: AuxEvent, data: &[u8]) {
        put16(&mut env.payload, 0, event.code());
        write_with_header(env, 2, data);
    }
}

// ── Keyboard ─────────────────────────────────────────────────

/// Batch of encoded keyboard symbols to type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardBatch<'a> {
    pub interface: u16,
    pub delay_ms: u16,
    symbols: &'a [u8],
}

impl<'a> KeyboardBatch<'a> {
    /// Symbols up to the zero terminator.
    pub fn symbols(&self) -> impl Iterator<Item = u16> + 'a {
        self.symbols
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&s| s != 0)
    }

    pub fn write(env: &mut Envelope, interface: u16, delay_ms: u16, symbols: &[u16]) {
        put16(&mut env.payload, 0, interface);
        put16(&mut env.payload, 2, delay_ms);
        // Keep room for the terminator
        let n = symbols.len().min((PAYLOAD_LEN - 4) / 2 - 1);
        for (i, s) in symbols[..n].iter().enumerate() {
            put16(&mut env.payload, 4 + i * 2, *s);
        }
        env.payload_length1 = (4 + (n + 1) * 2) as u16;
    }
}

// ── FIDO2 ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fido2Message<'a> {
    pub sub_type: u16,
    pub body: &'a [u8],
}

impl Fido2Message<'_> {
    pub fn write(env: &mut Envelope, sub_type: u16, body: &[u8]) {
        put16(&mut env.payload, 0, sub_type);
        put16(&mut env.payload, 2, 0);
        write_with_header(env, 4, body);
    }
}

// ── BLE control ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BleMessage<'a> {
    pub message_id: u16,
    pub data: &'a [u8],
}

impl BleMessage<'_> {
    pub fn data_u16(&self, index: usize) -> u16 {
        le16(self.data, index * 2)
    }

    pub fn write(env: &mut Envelope, message_id: u16, data: &[u8]) {
        put16(&mut env.payload, 0, message_id);
        write_with_header(env, 2, data);
    }
}

// ── Replies built by the aux MCU ─────────────────────────────

/// Platform details reply, natural C alignment (56 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformDetails {
    pub fw_major: u16,
    pub fw_minor: u16,
    pub did: u32,
    pub uid: [u32; 4],
    pub sdk_lib_major: u16,
    pub sdk_lib_minor: u16,
    pub sdk_fw_major: u16,
    pub sdk_fw_minor: u16,
    pub sdk_fw_build: u16,
    pub rf_version: u32,
    pub chip_id: u32,
    pub address: [u8; 6],
    pub stack_low_watermark: u32,
}

impl PlatformDetails {
    pub fn write_into(&self, env: &mut Envelope) {
        let p = &mut env.payload;
        put16(p, 0, self.fw_major);
        put16(p, 2, self.fw_minor);
        put32(p, 4, self.did);
        for (i, word) in self.uid.iter().enumerate() {
            put32(p, 8 + i * 4, *word);
        }
        put16(p, 24, self.sdk_lib_major);
        put16(p, 26, self.sdk_lib_minor);
        put16(p, 28, self.sdk_fw_major);
        put16(p, 30, self.sdk_fw_minor);
        put16(p, 32, self.sdk_fw_build);
        put16(p, 34, 0);
        put32(p, 36, self.rf_version);
        put32(p, 40, self.chip_id);
        p[44..50].copy_from_slice(&self.address);
        p[50..52].fill(0);
        put32(p, 52, self.stack_low_watermark);
        env.payload_length1 = PLATFORM_DETAILS_LEN as u16;
    }

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < PLATFORM_DETAILS_LEN {
            return None;
        }
        let mut address = [0u8; 6];
        address.copy_from_slice(&b[44..50]);
        Some(Self {
            fw_major: le16(b, 0),
            fw_minor: le16(b, 2),
            did: le32(b, 4),
            uid: core::array::from_fn(|i| le32(b, 8 + i * 4)),
            sdk_lib_major: le16(b, 24),
            sdk_lib_minor: le16(b, 26),
            sdk_fw_major: le16(b, 28),
            sdk_fw_minor: le16(b, 30),
            sdk_fw_build: le16(b, 32),
            rf_version: le32(b, 36),
            chip_id: le32(b, 40),
            address,
            stack_low_watermark: le32(b, 52),
        })
    }
}

/// NiMH charge status reply (10 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NimhStatus {
    pub charge_status: u16,
    pub battery_voltage: u16,
    pub charge_current: i16,
    pub stepdown_voltage: u16,
    pub dac_data_reg: u16,
}

impl NimhStatus {
    pub fn write_into(&self, env: &mut Envelope) {
        let p = &mut env.payload;
        put16(p, 0, self.charge_status);
        put16(p, 2, self.battery_voltage);
        p[4..6].copy_from_slice(&self.charge_current.to_le_bytes());
        put16(p, 6, self.stepdown_voltage);
        put16(p, 8, self.dac_data_reg);
        env.payload_length1 = NIMH_STATUS_LEN as u16;
    }

    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < NIMH_STATUS_LEN {
            return None;
        }
        Some(Self {
            charge_status: le16(b, 0),
            battery_voltage: le16(b, 2),
            charge_current: i16::from_le_bytes([b[4], b[5]]),
            stepdown_voltage: le16(b, 6),
            dac_data_reg: le16(b, 8),
        })
    }
}

/// Stored BLE bonding record (132 bytes, packed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BondingInfo {
    pub zero_to_be_valid: u16,
    pub address_resolv_type: u8,
    pub mac: [u8; 6],
    pub auth_type: u8,
    pub peer_ltk: [u8; 16],
    pub peer_ediv: u16,
    pub peer_rand: [u8; 8],
    pub peer_key_size: u16,
    pub peer_csrk: [u8; 16],
    pub peer_irk: [u8; 16],
    pub peer_irk_resolv_type: u8,
    pub peer_irk_address: [u8; 6],
    pub peer_irk_reserved: u8,
    pub host_ltk: [u8; 16],
    pub host_ediv: u16,
    pub host_rand: [u8; 8],
    pub host_key_size: u16,
    pub host_csrk: [u8; 16],
    pub reserved: [u8; 10],
}

/// Sequential little-endian reader over a fixed record.
struct Cursor<'a> {
    b: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> u8 {
        let v = self.b[self.at];
        self.at += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = le16(self.b, self.at);
        self.at += 2;
        v
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.b[self.at..self.at + N]);
        self.at += N;
        out
    }
}

impl BondingInfo {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < BONDING_INFO_LEN {
            return None;
        }
        let mut c = Cursor { b, at: 0 };
        Some(Self {
            zero_to_be_valid: c.u16(),
            address_resolv_type: c.u8(),
            mac: c.bytes(),
            auth_type: c.u8(),
            peer_ltk: c.bytes(),
            peer_ediv: c.u16(),
            peer_rand: c.bytes(),
            peer_key_size: c.u16(),
            peer_csrk: c.bytes(),
            peer_irk: c.bytes(),
            peer_irk_resolv_type: c.u8(),
            peer_irk_address: c.bytes(),
            peer_irk_reserved: c.u8(),
            host_ltk: c.bytes(),
            host_ediv: c.u16(),
            host_rand: c.bytes(),
            host_key_size: c.u16(),
            host_csrk: c.bytes(),
            reserved: c.bytes(),
        })
    }

    pub fn to_bytes(&self) -> [u8; BONDING_INFO_LEN] {
        let mut out = [0u8; BONDING_INFO_LEN];
        let mut at = 0;
        let mut push = |src: &[u8]| {
            out[at..at + src.len()].copy_from_slice(src);
            at += src.len();
        };
        push(&self.zero_to_be_valid.to_le_bytes());
        push(&[self.address_resolv_type]);
        push(&self.mac);
        push(&[self.auth_type]);
        push(&self.peer_ltk);
        push(&self.peer_ediv.to_le_bytes());
        push(&self.peer_rand);
        push(&self.peer_key_size.to_le_bytes());
        push(&self.peer_csrk);
        push(&self.peer_irk);
        push(&[self.peer_irk_resolv_type]);
        push(&self.peer_irk_address);
        push(&[self.peer_irk_reserved]);
        push(&self.host_ltk);
        push(&self.host_ediv.to_le_bytes());
        push(&self.host_rand);
        push(&self.host_key_size.to_le_bytes());
        push(&self.host_csrk);
        push(&self.reserved);
        out
    }
}
