//! Command processor against the mock board: replies, events, keyboard
//! typing, sleep handling and the manufacturing functional test.

use auxlink::app::ports::ChargeScheme;
use auxlink::diagnostics::DiagFlag;
use auxlink::envelope::codes::{
    AuxEvent, BleMessageId, BootloaderCommand, MainCommand, SHORTCUT_ENTER,
};
use auxlink::envelope::payload::{BleMessage, CommandMessage, KeyboardBatch, PlatformDetails};
use auxlink::envelope::{Envelope, MessageType, RawEnvelope};
use auxlink::interface::{HidInterface, LogicalInterface};

use crate::mock_hw::{BatteryCall, Harness, PlatformCall};

fn command(cmd: MainCommand, args: &[u8]) -> Envelope {
    let mut env = Envelope::new(MessageType::MainCommand);
    CommandMessage::write(&mut env, cmd.code(), args);
    env
}

fn event_of(env: &Envelope) -> u16 {
    assert_eq!(env.message_type, MessageType::AuxEvent);
    env.payload_u16(0)
}

/// Deliver one message, run one main-loop pass and return what was sent.
fn exchange(h: &mut Harness, env: &Envelope) -> Vec<Envelope> {
    h.deliver(env);
    h.tick();
    h.sent()
}

// ── Status and diagnostics ────────────────────────────────────

#[test]
fn get_status_reports_then_clears_latched_flags() {
    let mut h = Harness::new();

    let mut bogus = Envelope::new(MessageType::MainCommand);
    CommandMessage::write(&mut bogus, 0x7777, &[]);
    assert!(exchange(&mut h, &bogus).is_empty());
    h.diag.flag_adc_watchdog_fired();

    let sent = exchange(&mut h, &command(MainCommand::GetStatus, &[]));
    assert_eq!(sent.len(), 1);
    assert_eq!(event_of(&sent[0]), AuxEvent::HeresMyStatus.code());
    assert_eq!(sent[0].body(), &[0x0F, 0x00, 1, 1, 1, 0, 1]);

    let sent = exchange(&mut h, &command(MainCommand::GetStatus, &[]));
    assert_eq!(sent[0].body(), &[0x0F, 0x00, 1, 1, 0, 0, 0]);
}

#[test]
fn unknown_message_type_latches_invalid_flag() {
    let mut h = Harness::new();
    let mut raw = RawEnvelope::zeroed();
    raw.as_bytes_mut()[0] = 0x42;
    h.rx.on_bytes(raw.as_bytes());
    h.tick();

    assert!(h.sent().is_empty());
    assert!(h.diag.is_set(DiagFlag::InvalidMessage));
}

#[test]
fn reset_sentinel_resets_the_mcu() {
    let mut h = Harness::new();
    h.rx.on_bytes(RawEnvelope::reset_sentinel().as_bytes());
    h.tick();
    assert_eq!(h.board.platform.calls, [PlatformCall::SystemReset]);
    assert!(!h.diag.is_set(DiagFlag::InvalidMessage));
}

fn bootloader(command: u16) -> Envelope {
    let mut env = Envelope::new(MessageType::Bootloader);
    env.payload[..2].copy_from_slice(&command.to_le_bytes());
    env.payload_length1 = 4;
    env
}

#[test]
fn unknown_bootloader_command_is_reported_in_status() {
    let mut h = Harness::new();
    assert!(exchange(&mut h, &bootloader(0x0009)).is_empty());
    assert!(h.board.platform.calls.is_empty());

    let sent = exchange(&mut h, &command(MainCommand::GetStatus, &[]));
    assert_eq!(sent[0].body(), &[0x0F, 0x00, 1, 1, 1, 0, 0]);
}

#[test]
fn bootloader_start_app_is_ignored() {
    let mut h = Harness::new();
    assert!(exchange(&mut h, &bootloader(BootloaderCommand::StartApp.code())).is_empty());
    assert!(h.board.platform.calls.is_empty());
    assert!(!h.diag.is_set(DiagFlag::InvalidMessage));
}

#[test]
fn ping_answers_im_here() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &Envelope::new(MessageType::PingWithInfo));
    assert_eq!(event_of(&sent[0]), AuxEvent::ImHere.code());
}

// ── Replies ───────────────────────────────────────────────────

#[test]
fn platform_details_include_radio_versions() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &Envelope::new(MessageType::PlatformDetails));

    assert_eq!(sent[0].message_type, MessageType::PlatformDetails);
    let details = PlatformDetails::from_bytes(sent[0].body()).expect("56-byte reply");
    assert_eq!((details.fw_major, details.fw_minor), (1, 7));
    assert_eq!((details.sdk_lib_major, details.sdk_lib_minor), (4, 2));
    assert_eq!(
        (details.sdk_fw_major, details.sdk_fw_minor, details.sdk_fw_build),
        (5, 3, 0x1234)
    );
    assert_eq!(details.address, [1, 2, 3, 4, 5, 6]);
}

#[test]
fn platform_details_without_radio_leave_radio_fields_zero() {
    let mut h = Harness::new();
    h.board.radio.enabled = false;
    let sent = exchange(&mut h, &Envelope::new(MessageType::PlatformDetails));
    let details = PlatformDetails::from_bytes(sent[0].body()).expect("56-byte reply");
    assert_eq!(details.did, 0x1081_0A05);
    assert_eq!(details.sdk_fw_build, 0);
    assert_eq!(details.chip_id, 0);
}

#[test]
fn nimh_status_reply() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &Envelope::new(MessageType::NimhCharge));
    assert_eq!(sent[0].message_type, MessageType::NimhCharge);
    assert_eq!(sent[0].payload_length1, 10);
    assert_eq!(sent[0].payload_u16(1), 1320);
}

// ── Charging and USB ──────────────────────────────────────────

#[test]
fn charge_commands_drive_battery_port() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &command(MainCommand::NimhChargeSlowStart, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::ChargeStarted.code());

    let sent = exchange(&mut h, &command(MainCommand::StopCharge, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::ChargeStopped.code());

    assert_eq!(
        h.board.battery.calls,
        [
            BatteryCall::StartCharging(ChargeScheme::SlowStart23C),
            BatteryCall::StopCharging
        ]
    );
}

#[test]
fn retired_charge_mode_is_ignored() {
    let mut h = Harness::new();
    assert!(exchange(&mut h, &command(MainCommand::NimhDangerCharge, &[])).is_empty());
    assert!(h.board.battery.calls.is_empty());
    assert!(!h.diag.is_set(DiagFlag::InvalidMessage));
}

#[test]
fn attach_and_detach_usb() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &command(MainCommand::AttachUsb, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::AttachCommandReceived.code());
    assert_eq!(h.board.hid.attached, Some(true));

    let sent = exchange(&mut h, &command(MainCommand::DetachUsb, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::UsbDetached.code());
    assert_eq!(h.board.hid.attached, Some(false));
    assert_eq!(
        h.board.battery.calls,
        [
            BatteryCall::StartAdc,
            BatteryCall::StopCharging,
            BatteryCall::StopAdc
        ]
    );
}

#[test]
fn battery_level_goes_to_radio() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &command(MainCommand::SetBatteryLevel, &[80]));
    assert_eq!(event_of(&sent[0]), AuxEvent::NewBatteryLevelReceived.code());
    assert_eq!(h.board.radio.battery_level, Some(80));
}

#[test]
fn no_comms_unavailable_is_acknowledged() {
    let mut h = Harness::new();
    let sent = exchange(&mut h, &command(MainCommand::NoCommsUnavailable, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::NoCommsInfoReceived.code());
    assert!(h.board.no_comms.unavailable);
}

// ── BLE control ───────────────────────────────────────────────

#[test]
fn ble_commands_drive_radio() {
    let mut h = Harness::new();

    let mut enable = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut enable, BleMessageId::Enable.code(), &[9, 8, 7]);
    assert!(exchange(&mut h, &enable).is_empty());
    let config = h.board.radio.enable_config.clone().expect("radio enabled");
    assert_eq!(&config[..3], &[9, 8, 7]);

    let mut clear = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut clear, BleMessageId::ClearBondInfo.code(), &[]);
    let sent = exchange(&mut h, &clear);
    assert_eq!(event_of(&sent[0]), AuxEvent::BondingCleared.code());
    assert!(h.board.radio.bonds_cleared);

    let mut pairing = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut pairing, BleMessageId::DisablePairing.code(), &[]);
    exchange(&mut h, &pairing);
    assert_eq!(h.board.radio.open_to_pairing, Some(false));
}

#[test]
fn disconnect_for_next_reports_only_when_connected() {
    let mut h = Harness::new();
    let mut msg = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut msg, BleMessageId::DisconnectForNext.code(), &[]);

    let sent = exchange(&mut h, &msg);
    assert_eq!(event_of(&sent[0]), AuxEvent::BleDisconnected.code());

    h.board.radio.has_connection = false;
    assert!(exchange(&mut h, &msg).is_empty());
}

#[test]
fn unknown_ble_command_is_flagged() {
    let mut h = Harness::new();
    let mut msg = Envelope::new(MessageType::BleCommand);
    BleMessage::write(&mut msg, 0x00EE, &[]);
    assert!(exchange(&mut h, &msg).is_empty());
    assert!(h.diag.is_set(DiagFlag::InvalidMessage));
}

// ── Keyboard ──────────────────────────────────────────────────

#[test]
fn keyboard_batch_types_every_symbol() {
    let mut h = Harness::new();
    let mut batch = Envelope::new(MessageType::KeyboardType);
    KeyboardBatch::write(&mut batch, 0, 15, &[0x0004, 0xFFFF, 0x8005, 0x0607]);

    let sent = exchange(&mut h, &batch);
    assert_eq!(sent[0].message_type, MessageType::KeyboardType);
    assert_eq!(sent[0].payload_length1, 2);
    assert_eq!(sent[0].payload_u16(0), 1);

    let keys: Vec<u8> = h.board.keyboard.typed.iter().map(|t| t.1).collect();
    assert_eq!(keys, [0x04, 0x05, 0x2C, 0x06, 0x07]);
    assert!(
        h.board
            .keyboard
            .typed
            .iter()
            .all(|t| t.0 == HidInterface::Usb)
    );
}

#[test]
fn keyboard_failure_reports_zero() {
    let mut h = Harness::new();
    h.board.keyboard.fail_after = Some(1);
    let mut batch = Envelope::new(MessageType::KeyboardType);
    KeyboardBatch::write(&mut batch, 1, 15, &[0x0004, 0x0005, 0x0006]);

    let sent = exchange(&mut h, &batch);
    assert_eq!(sent[0].payload_u16(0), 0);
    assert_eq!(h.board.keyboard.typed.len(), 1);
    assert_eq!(h.board.keyboard.typed[0].0, HidInterface::Ble);
}

#[test]
fn enter_shortcut_types_return() {
    let mut h = Harness::new();
    let sent = exchange(
        &mut h,
        &command(MainCommand::TypeShortcut, &[1, SHORTCUT_ENTER]),
    );
    assert_eq!(event_of(&sent[0]), AuxEvent::ShortcutTyped.code());
    assert_eq!(h.board.keyboard.typed, [(HidInterface::Ble, 0x28, 0)]);
}

// ── Device status cache ───────────────────────────────────────

#[test]
fn device_status_update_is_pushed_to_enumerated_usb() {
    let mut h = Harness::new();
    h.hid_rx.on_connection_set(HidInterface::Usb);
    h.tick();
    let sent = h.sent();
    assert_eq!(event_of(&sent[0]), AuxEvent::UsbEnumerated.code());

    let sent = exchange(
        &mut h,
        &command(MainCommand::UpdateDeviceStatus, &[1, 2, 3, 4]),
    );
    assert_eq!(event_of(&sent[0]), AuxEvent::NewStatusReceived.code());
    assert_eq!(h.comms.hid().cached_status(), [1, 2, 3, 4]);

    let frames = h.board.hid.frames_to(HidInterface::Usb);
    assert_eq!(frames.len(), 1);
    assert_eq!(&frames[0][..10], &[8, 0, 0x11, 0, 4, 0, 1, 2, 3, 4]);
}

// ── Sleep ─────────────────────────────────────────────────────

#[test]
fn sleep_with_radio_off_enters_standby() {
    let mut h = Harness::new();
    h.board.radio.enabled = false;

    let sent = exchange(&mut h, &command(MainCommand::Sleep, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::SleepReceived.code());
    assert_eq!(
        h.board.platform.calls,
        [
            PlatformCall::DisableMainComms,
            PlatformCall::StandbySleep,
            PlatformCall::EnableMainComms
        ]
    );
    // Boot arm plus re-arm after wake
    assert_eq!(h.comms.transport().link().rx_armed(), 2);
    assert!(!h.comms.transport().peer_sleep_requested());
}

#[test]
fn command_after_standby_with_lost_sleep_tail_is_handled() {
    let mut h = Harness::new();
    h.board.radio.enabled = false;

    // Only the head of SLEEP arrives; it is answered early and the tail
    // never lands before standby
    let sleep = command(MainCommand::Sleep, &[]).encode();
    h.rx.on_bytes(&sleep.as_bytes()[..16]);
    h.tick();
    let sent = h.sent();
    assert_eq!(event_of(&sent[0]), AuxEvent::SleepReceived.code());
    assert!(h.board.platform.calls.contains(&PlatformCall::StandbySleep));
    assert!(!h.rx.answered_early(LogicalInterface::Other));

    let sent = exchange(&mut h, &command(MainCommand::GetStatus, &[]));
    assert_eq!(sent.len(), 1);
    assert_eq!(event_of(&sent[0]), AuxEvent::HeresMyStatus.code());
}

#[test]
fn sleep_with_radio_on_wakes_peer_on_next_send() {
    let mut h = Harness::new();

    let sent = exchange(&mut h, &command(MainCommand::Sleep, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::SleepReceived.code());
    assert!(h.board.platform.calls.is_empty());
    assert!(h.comms.transport().peer_sleep_requested());

    h.board.no_comms.asserted = true;
    let before = h.board.clock.peek();
    let sent = exchange(&mut h, &Envelope::new(MessageType::PingWithInfo));

    assert_eq!(event_of(&sent[0]), AuxEvent::ImHere.code());
    assert_eq!(h.board.no_comms.pulses, 1);
    assert_eq!(h.board.platform.calls, [PlatformCall::EnableMainComms]);
    assert!(!h.comms.transport().peer_sleep_requested());
    // No pulse inside the wake-delay window
    assert!(h.board.clock.peek() - before >= 400);
}

// ── Functional test ───────────────────────────────────────────

fn functional_test_code(h: &mut Harness) -> u8 {
    let sent = exchange(h, &command(MainCommand::FunctionalTest, &[]));
    assert_eq!(event_of(&sent[0]), AuxEvent::FunctionalTestDone.code());
    sent[0].payload[2]
}

#[test]
fn functional_test_passes_on_healthy_board() {
    let mut h = Harness::new();
    assert_eq!(functional_test_code(&mut h), 0);
    assert_eq!(h.board.radio.started_with, Some([0xDE, 0xAD, 0xBE, 0xEF, 0x12, 0x13]));
    assert_eq!(h.board.radio.dtm_channels, [20]);
    assert!(h.board.charge_path.step_down_mv.is_none());
    assert!(!h.board.charge_path.mosfets);
}

#[test]
fn functional_test_reports_dead_radio() {
    let mut h = Harness::new();
    h.board.radio.alive = false;
    assert_eq!(functional_test_code(&mut h), 1);
}

#[test]
fn functional_test_reports_ramp_over_voltage() {
    let mut h = Harness::new();
    h.board.charge_path.conduct_at_mv = u16::MAX;
    assert_eq!(functional_test_code(&mut h), 2);
    assert!(h.board.charge_path.highest_mv <= 1650);
    assert!(!h.board.charge_path.mosfets);
}

#[test]
fn functional_test_reports_sense_faults() {
    let mut h = Harness::new();
    h.board.charge_path.idle_high = 400;
    assert_eq!(functional_test_code(&mut h), 3);

    let mut h = Harness::new();
    h.board.charge_path.leak = 150;
    assert_eq!(functional_test_code(&mut h), 3);
    assert!(h.board.charge_path.step_down_mv.is_none());
}

// ── Radio test commands ───────────────────────────────────────

#[test]
fn tone_and_dtm_commands_reach_radio() {
    let mut h = Harness::new();
    let mut args = Vec::new();
    for v in [2402u16, 37, 1] {
        args.extend_from_slice(&v.to_le_bytes());
    }
    assert!(exchange(&mut h, &command(MainCommand::TxToneContinuous, &args)).is_empty());
    assert!(exchange(&mut h, &command(MainCommand::DtmStop, &[])).is_empty());
    assert_eq!(h.board.radio.tones, [(2402, 37, 1)]);
    assert_eq!(h.board.radio.tone_stops, 1);
}
