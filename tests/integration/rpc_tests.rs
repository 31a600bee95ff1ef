//! Blocking request/reply helpers. The scripted main MCU answers from the
//! radio event pump, which every wait loop services.

use auxlink::envelope::codes::{AuxEvent, BleMessageId, Fido2SubType, MainCommand};
use auxlink::envelope::payload::{BleMessage, BondingInfo, CommandMessage, Fido2Message};
use auxlink::envelope::{Envelope, MessageType, Payload};
use auxlink::error::RpcError;
use auxlink::rpc::{IRK_LEN, PIN_LEN, RNG_TRANSFER_LEN};

use crate::mock_hw::Harness;

fn ble_reply(id: BleMessageId, data: &[u8]) -> Envelope {
    let mut env = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut env, id.code(), data);
    env
}

fn fido2(sub_type: Fido2SubType, body: &[u8]) -> Envelope {
    let mut env = Envelope::new(MessageType::Fido2);
    Fido2Message::write(&mut env, sub_type.code(), body);
    env
}

// ── RNG ───────────────────────────────────────────────────────

#[test]
fn random_bytes_arrive() {
    let mut h = Harness::new();
    let mut reply = Envelope::new(MessageType::RngTransfer);
    reply.set_body(&[0x5A; RNG_TRANSFER_LEN]);
    h.script_reply(reply);

    let mut out = [0u8; RNG_TRANSFER_LEN];
    let res = h.comms.fetch_random_bytes(&mut h.board.ports(), &mut out);
    assert_eq!(res, Ok(()));
    assert_eq!(out, [0x5A; RNG_TRANSFER_LEN]);

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_type, MessageType::RngTransfer);
    assert_eq!(sent[0].payload_length1, 1);
}

#[test]
fn short_random_reply_is_rejected() {
    let mut h = Harness::new();
    let mut reply = Envelope::new(MessageType::RngTransfer);
    reply.set_body(&[0x5A; RNG_TRANSFER_LEN / 2]);
    h.script_reply(reply);

    let mut out = [0xAAu8; RNG_TRANSFER_LEN];
    let res = h.comms.fetch_random_bytes(&mut h.board.ports(), &mut out);
    assert_eq!(res, Err(RpcError::InvalidReply));
    assert_eq!(out, [0; RNG_TRANSFER_LEN]);
}

#[test]
fn silent_main_mcu_times_out_with_zeroed_output() {
    let mut h = Harness::new();
    let mut out = [0xAAu8; RNG_TRANSFER_LEN];
    let start = h.board.clock.peek();

    let res = h.comms.fetch_random_bytes(&mut h.board.ports(), &mut out);

    assert_eq!(res, Err(RpcError::Timeout));
    assert_eq!(out, [0; RNG_TRANSFER_LEN]);
    assert!(h.board.clock.peek() - start >= 5_000);
}

#[test]
fn other_traffic_is_processed_while_waiting() {
    let mut h = Harness::new();
    let mut status = Envelope::new(MessageType::MainCommand);
    CommandMessage::write(&mut status, MainCommand::GetStatus.code(), &[]);
    h.script_reply(status);
    let mut reply = Envelope::new(MessageType::RngTransfer);
    reply.set_body(&[1; RNG_TRANSFER_LEN]);
    h.script_reply(reply);

    let mut out = [0u8; RNG_TRANSFER_LEN];
    h.comms
        .fetch_random_bytes(&mut h.board.ports(), &mut out)
        .expect("reply scripted");

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].message_type, MessageType::RngTransfer);
    assert_eq!(sent[1].payload_u16(0), AuxEvent::HeresMyStatus.code());
    assert_eq!(out, [1; RNG_TRANSFER_LEN]);
}

// ── PIN ───────────────────────────────────────────────────────

#[test]
fn pin_is_six_digits() {
    let mut h = Harness::new();
    h.script_reply(ble_reply(BleMessageId::GetSixDigitCode, b"482910"));

    let mut pin = [0u8; PIN_LEN];
    h.comms
        .fetch_pin(&mut h.board.ports(), &mut pin)
        .expect("pin entered");
    assert_eq!(&pin, b"482910");

    let sent = h.sent();
    assert_eq!(sent[0].message_type, MessageType::BleCommand);
    assert_eq!(sent[0].payload_u16(0), BleMessageId::GetSixDigitCode.code());
    assert_eq!(sent[0].payload_length1, 2);
}

#[test]
fn short_pin_reply_is_rejected() {
    let mut h = Harness::new();
    h.script_reply(ble_reply(BleMessageId::GetSixDigitCode, b"4829"));

    let mut pin = [0xFFu8; PIN_LEN];
    let res = h.comms.fetch_pin(&mut h.board.ports(), &mut pin);
    assert_eq!(res, Err(RpcError::InvalidReply));
    assert_eq!(pin, [0; PIN_LEN]);
}

// ── Bonding ───────────────────────────────────────────────────

fn sample_bond() -> BondingInfo {
    BondingInfo {
        address_resolv_type: 1,
        mac: [0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22],
        peer_ltk: [7; 16],
        peer_irk: [9; IRK_LEN],
        host_key_size: 16,
        ..BondingInfo::default()
    }
}

#[test]
fn bonding_info_recalled_by_mac() {
    let mut h = Harness::new();
    let bond = sample_bond();
    h.script_reply(ble_reply(BleMessageId::RecallBondInfo, &bond.to_bytes()));

    let got = h
        .comms
        .fetch_bonding_info_for_mac(&mut h.board.ports(), 1, &bond.mac)
        .expect("bond stored");
    assert_eq!(got, bond);

    let sent = h.sent();
    assert_eq!(sent[0].payload_length1, 9);
    assert_eq!(sent[0].payload[2], 1);
    assert_eq!(&sent[0].payload[3..9], &bond.mac);
}

#[test]
fn unknown_bond_is_invalid_reply() {
    let mut h = Harness::new();
    h.script_reply(ble_reply(BleMessageId::RecallBondInfoIrk, &[]));

    let res = h
        .comms
        .fetch_bonding_info_for_irk(&mut h.board.ports(), &[3; IRK_LEN]);
    assert_eq!(res, Err(RpcError::InvalidReply));
    assert_eq!(h.sent()[0].payload_length1, 18);
}

#[test]
fn irk_list_is_capped_at_capacity() {
    let mut h = Harness::new();
    let mut data = vec![2, 0];
    data.extend_from_slice(&[0x11; IRK_LEN]);
    data.extend_from_slice(&[0x22; IRK_LEN]);
    h.script_reply(ble_reply(BleMessageId::GetIrkKeys, &data));

    let mut keys: heapless::Vec<[u8; IRK_LEN], 1> = heapless::Vec::new();
    let count = h
        .comms
        .fetch_irk_keys(&mut h.board.ports(), &mut keys)
        .expect("keys returned");
    assert_eq!(count, 1);
    assert_eq!(keys[0], [0x11; IRK_LEN]);
}

#[test]
fn store_bonding_info_needs_no_reply() {
    let mut h = Harness::new();
    let bond = sample_bond();
    h.comms
        .store_bonding_info(&mut h.board.ports(), &bond)
        .expect("sent");

    let sent = h.sent();
    assert_eq!(sent[0].payload_u16(0), BleMessageId::StoreBondInfo.code());
    assert_eq!(sent[0].payload_length1, 134);
    assert_eq!(BondingInfo::from_bytes(&sent[0].payload[2..]), Some(bond));
}

// ── FIDO2 ─────────────────────────────────────────────────────

#[test]
fn fido2_retry_resends_request() {
    let mut h = Harness::new();
    h.script_reply(fido2(Fido2SubType::Retry, &[]));
    h.script_reply(fido2(Fido2SubType::MakeCredResponse, b"attestation"));

    let reply = h
        .comms
        .fido2_exchange(
            &mut h.board.ports(),
            Fido2SubType::MakeCredRequest,
            b"client data",
        )
        .expect("response scripted");

    match reply.payload() {
        Payload::Fido2(msg) => {
            assert_eq!(msg.sub_type, Fido2SubType::MakeCredResponse.code());
            assert_eq!(&msg.body[..11], b"attestation");
        }
        other => panic!("unexpected payload {other:?}"),
    }

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0].payload_u16(0), Fido2SubType::MakeCredRequest.code());
}

#[test]
fn link_fault_fails_request() {
    let mut h = Harness::new();
    h.comms.transport_mut().link_mut().set_fail_tx(true);

    let mut out = [0u8; RNG_TRANSFER_LEN];
    let res = h.comms.fetch_random_bytes(&mut h.board.ports(), &mut out);
    assert!(matches!(res, Err(RpcError::Transport(_))));
}
