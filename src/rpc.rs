//! Blocking request/reply exchanges with the main MCU.
//!
//! ```text
//! request(expected, timeout, build)
//!   │ build Request buffer ─▶ send ─▶ loop {
//!   │                                  router.poll_for(expected) ─▶ reply? return
//!   │                                  deadline passed?           ─▶ Timeout
//!   │                                  radio.service_events()
//!   └                                }
//! ```
//!
//! While waiting, every other inbound message is still routed and
//! processed. Requests and replies share a message type. On any failure
//! the typed helpers leave their output zeroed or empty.

use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::Ports;
use crate::comms::{AuxComms, Dispatcher};
use crate::envelope::codes::{BleMessageId, Fido2SubType};
use crate::envelope::payload::{BONDING_INFO_LEN, BleMessage, BondingInfo, Fido2Message};
use crate::envelope::{Envelope, MessageType};
use crate::error::{RpcError, TransportError};
use crate::link::{AuxLink, SendClass};

/// Random bytes per RNG transfer.
pub const RNG_TRANSFER_LEN: usize = 32;
/// Digits in a BLE pairing PIN.
pub const PIN_LEN: usize = 6;
pub const IRK_LEN: usize = 16;

/// Offset of the BLE reply data after `message_id`.
const BLE_DATA: usize = 2;

impl<L: AuxLink> AuxComms<'_, L> {
    /// Send a `expected`-typed request built by `build` on the `Request`
    /// buffer and wait up to `timeout_ms` for the reply.
    pub fn request(
        &mut self,
        ports: &mut Ports<'_>,
        expected: MessageType,
        timeout_ms: u32,
        build: impl FnOnce(&mut Envelope),
    ) -> Result<Envelope, RpcError> {
        let buf = self
            .core
            .transport
            .acquire_send_buffer(SendClass::Request, expected, ports);
        build(buf);
        self.core.transport.send(SendClass::Request, ports)?;
        self.await_reply(ports, expected, timeout_ms)
    }

    fn await_reply(
        &mut self,
        ports: &mut Ports<'_>,
        expected: MessageType,
        timeout_ms: u32,
    ) -> Result<Envelope, RpcError> {
        let deadline = ports.clock.now_ms() + u64::from(timeout_ms);
        let rx = self.core.rx;
        loop {
            let mut sink = Dispatcher {
                core: &mut self.core,
                ports: &mut *ports,
            };
            if let Some(reply) = self.router.poll_for(rx, &mut sink, expected) {
                debug!("RPC: {expected:?} reply, len1={}", reply.payload_length1);
                return Ok(reply);
            }
            if ports.clock.now_ms() >= deadline {
                warn!("RPC: no {expected:?} reply within {timeout_ms} ms");
                return Err(RpcError::Timeout);
            }
            ports.radio.service_events();
        }
    }

    // ── Typed helpers ────────────────────────────────────────

    pub fn fetch_random_bytes(
        &mut self,
        ports: &mut Ports<'_>,
        out: &mut [u8; RNG_TRANSFER_LEN],
    ) -> Result<(), RpcError> {
        out.fill(0);
        let timeout = self.core.config.main_wait_timeout_ms;
        let reply = self.request(ports, MessageType::RngTransfer, timeout, |env| {
            env.payload_length1 = 1;
        })?;
        if usize::from(reply.payload_length1) < RNG_TRANSFER_LEN {
            warn!("RPC: short RNG reply, len1={}", reply.payload_length1);
            return Err(RpcError::InvalidReply);
        }
        out.copy_from_slice(&reply.payload[..RNG_TRANSFER_LEN]);
        Ok(())
    }

    /// Ask the user for the six-digit pairing PIN on the device.
    pub fn fetch_pin(
        &mut self,
        ports: &mut Ports<'_>,
        out: &mut [u8; PIN_LEN],
    ) -> Result<(), RpcError> {
        out.fill(0);
        let timeout = self.core.config.pin_entry_timeout_ms;
        let reply = self.request(ports, MessageType::BleCommand, timeout, |env| {
            BleMessage::write(env, BleMessageId::GetSixDigitCode.code(), &[]);
        })?;
        if usize::from(reply.payload_length1) != BLE_DATA + PIN_LEN {
            return Err(RpcError::InvalidReply);
        }
        out.copy_from_slice(&reply.payload[BLE_DATA..BLE_DATA + PIN_LEN]);
        Ok(())
    }

    pub fn fetch_bonding_info_for_mac(
        &mut self,
        ports: &mut Ports<'_>,
        address_resolv_type: u8,
        mac: &[u8; 6],
    ) -> Result<BondingInfo, RpcError> {
        let mut query = [0u8; 7];
        query[0] = address_resolv_type;
        query[1..].copy_from_slice(mac);
        self.recall_bonding_info(ports, BleMessageId::RecallBondInfo, &query)
    }

    pub fn fetch_bonding_info_for_irk(
        &mut self,
        ports: &mut Ports<'_>,
        irk: &[u8; IRK_LEN],
    ) -> Result<BondingInfo, RpcError> {
        self.recall_bonding_info(ports, BleMessageId::RecallBondInfoIrk, irk)
    }

    fn recall_bonding_info(
        &mut self,
        ports: &mut Ports<'_>,
        id: BleMessageId,
        query: &[u8],
    ) -> Result<BondingInfo, RpcError> {
        let timeout = self.core.config.main_wait_timeout_ms;
        let reply = self.request(ports, MessageType::BleCommand, timeout, |env| {
            BleMessage::write(env, id.code(), query);
        })?;
        // A miss comes back with an empty body
        if usize::from(reply.payload_length1) != BLE_DATA + BONDING_INFO_LEN {
            return Err(RpcError::InvalidReply);
        }
        BondingInfo::from_bytes(&reply.payload[BLE_DATA..]).ok_or(RpcError::InvalidReply)
    }

    /// Fill `out` with every stored IRK (up to `N`). Returns the count.
    pub fn fetch_irk_keys<const N: usize>(
        &mut self,
        ports: &mut Ports<'_>,
        out: &mut Vec<[u8; IRK_LEN], N>,
    ) -> Result<usize, RpcError> {
        out.clear();
        let timeout = self.core.config.main_wait_timeout_ms;
        let reply = self.request(ports, MessageType::BleCommand, timeout, |env| {
            BleMessage::write(env, BleMessageId::GetIrkKeys.code(), &[]);
        })?;

        let count = usize::from(reply.payload_u16(1));
        let keys = &reply.payload[BLE_DATA + 2..];
        for chunk in keys.chunks_exact(IRK_LEN).take(count) {
            let mut key = [0u8; IRK_LEN];
            key.copy_from_slice(chunk);
            if out.push(key).is_err() {
                warn!("RPC: {count} IRKs offered, keeping {N}");
                break;
            }
        }
        Ok(out.len())
    }

    /// Hand a bonding record to the main MCU for storage. No reply.
    pub fn store_bonding_info(
        &mut self,
        ports: &mut Ports<'_>,
        info: &BondingInfo,
    ) -> Result<(), TransportError> {
        let buf = self
            .core
            .transport
            .acquire_send_buffer(SendClass::Request, MessageType::BleCommand, ports);
        BleMessage::write(buf, BleMessageId::StoreBondInfo.code(), &info.to_bytes());
        self.core.transport.send(SendClass::Request, ports)
    }

    /// One FIDO2 request/response. A `Retry` from the main MCU resends the
    /// request and keeps waiting.
    pub fn fido2_exchange(
        &mut self,
        ports: &mut Ports<'_>,
        sub_type: Fido2SubType,
        body: &[u8],
    ) -> Result<Envelope, RpcError> {
        let timeout = self.core.config.pin_entry_timeout_ms;
        self.request(ports, MessageType::Fido2, timeout, |env| {
            Fido2Message::write(env, sub_type.code(), body);
        })
    }
}
