//! Command processor: executes aux-bound messages from the main MCU.
//!
//! ```text
//! RawEnvelope ─▶ reset sentinel? ─▶ system_reset
//!             └▶ decode ─▶ Payload ─┬─ PlatformDetails / NimhCharge ─▶ reply
//!                                   ├─ Bootloader, Ping, KeyboardType
//!                                   ├─ Ble ─▶ radio port
//!                                   └─ Command ─▶ MainCommand table
//! ```
//!
//! Replies and events go out on the `Reply` buffer. Anything the table
//! does not know latches the invalid-message diagnostic flag and is
//! otherwise ignored; the main MCU learns about it on its next
//! `GetStatus`.

pub mod functest;
pub mod keyboard;

use log::{debug, info, warn};

use crate::app::ports::{ChargeScheme, Ports};
use crate::comms::CommsCore;
use crate::diagnostics::DiagFlag;
use crate::envelope::codes::{
    AuxEvent, BleMessageId, MainCommand, SHORTCUT_CTRL_ALT_DEL, SHORTCUT_ENTER, SHORTCUT_WIN_L,
};
use crate::envelope::payload::{
    BleMessage, BootloaderMessage, CommandMessage, EventMessage, KeyboardBatch, NimhStatus,
    PlatformDetails,
};
use crate::envelope::{Envelope, MessageType, Payload, RawEnvelope};
use crate::error::TransportError;
use crate::hid::DEVICE_STATUS_LEN;
use crate::interface::{HidInterface, LogicalInterface};
use crate::link::{AuxLink, SendClass};

use keyboard::{KEY_CTRL, KEY_DELETE, KEY_RETURN, KEY_RIGHT_ALT};

/// Split of the radio SDK's packed firmware version word.
fn sdk_version_fields(word: u32) -> (u16, u16, u16) {
    let major = ((word >> 28) & 0x0F) as u16;
    let minor = ((word >> 24) & 0x0F) as u16;
    let build = (word & 0xFFFF) as u16;
    (major, minor, build)
}

impl<L: AuxLink> CommsCore<'_, L> {
    /// Execute one aux-bound message.
    pub fn process(&mut self, raw: &RawEnvelope, ports: &mut Ports<'_>) {
        if raw.is_reset_sentinel() {
            warn!("CMD: reset sentinel received");
            ports.platform.system_reset();
            return;
        }

        let env = match Envelope::decode(raw) {
            Ok(env) => env,
            Err(e) => {
                warn!("CMD: dropping {e}");
                self.diag.set(DiagFlag::InvalidMessage);
                return;
            }
        };

        if let Err(e) = self.execute(&env, ports) {
            warn!("CMD: reply to {:?} not sent: {e}", env.message_type);
        }
    }

    fn execute(&mut self, env: &Envelope, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        match env.payload() {
            Payload::PlatformDetails => self.reply_platform_details(ports),
            Payload::NimhCharge => self.reply_nimh_status(ports),
            Payload::Bootloader(BootloaderMessage::StartProgramming { .. }) => {
                info!("CMD: entering bootloader");
                ports.platform.set_bootloader_flag();
                ports.platform.system_reset();
                Ok(())
            }
            Payload::Bootloader(BootloaderMessage::Unknown(command)) => {
                self.flag_invalid("bootloader command", command);
                Ok(())
            }
            // Write and StartApp only mean something to the bootloader itself
            Payload::Bootloader(_) => Ok(()),
            Payload::PingWithInfo => self.event(AuxEvent::ImHere, ports),
            Payload::KeyboardType(batch) => self.type_batch(batch, ports),
            Payload::Ble(msg) => self.ble_command(msg, ports),
            Payload::Command(cmd) => self.main_command(cmd, ports),
            Payload::Hid(_) | Payload::Event(_) | Payload::Fido2(_) | Payload::Rng(_) => {
                self.flag_invalid("message type", env.message_type.code());
                Ok(())
            }
        }
    }

    fn event(&mut self, event: AuxEvent, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        self.transport.send_simple_event(event, ports)
    }

    // ── Replies ──────────────────────────────────────────────

    fn reply_platform_details(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        let (fw_major, fw_minor) = ports.platform.firmware_version();
        let mut details = PlatformDetails {
            fw_major,
            fw_minor,
            did: ports.platform.device_id(),
            uid: ports.platform.unique_id(),
            stack_low_watermark: ports.platform.stack_low_watermark(),
            ..PlatformDetails::default()
        };

        if ports.radio.is_enabled() {
            (details.sdk_lib_major, details.sdk_lib_minor) = ports.radio.sdk_version();
            if let Some(word) = ports.radio.firmware_version() {
                (details.sdk_fw_major, details.sdk_fw_minor, details.sdk_fw_build) =
                    sdk_version_fields(word);
                details.rf_version = ports.radio.rf_version();
                details.chip_id = ports.radio.chip_id();
                details.address = ports.radio.address();
            }
        }

        let buf = self
            .transport
            .acquire_send_buffer(SendClass::Reply, MessageType::PlatformDetails, ports);
        details.write_into(buf);
        self.transport.send(SendClass::Reply, ports)
    }

    fn reply_nimh_status(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        let status = NimhStatus {
            charge_status: ports.battery.charging_status(),
            battery_voltage: ports.battery.battery_voltage(),
            charge_current: ports.battery.charging_current(),
            stepdown_voltage: ports.battery.stepdown_voltage(),
            dac_data_reg: ports.battery.dac_data_register(),
        };
        let buf = self
            .transport
            .acquire_send_buffer(SendClass::Reply, MessageType::NimhCharge, ports);
        status.write_into(buf);
        self.transport.send(SendClass::Reply, ports)
    }

    fn reply_status(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        let ble_enabled = ports.radio.is_enabled();
        let ble_operational = ble_enabled && ports.radio.firmware_version().is_some();
        let status = [
            u8::from(ble_enabled),
            u8::from(ble_operational),
            u8::from(self.diag.take(DiagFlag::InvalidMessage)),
            u8::from(ports.platform.take_too_many_timers_flag()),
            u8::from(self.diag.take(DiagFlag::AdcWatchdog)),
        ];
        let buf = self
            .transport
            .acquire_send_buffer(SendClass::Reply, MessageType::AuxEvent, ports);
        EventMessage::write(buf, AuxEvent::HeresMyStatus, &status);
        self.transport.send(SendClass::Reply, ports)
    }

    // ── Keyboard ─────────────────────────────────────────────

    fn type_batch(
        &mut self,
        batch: KeyboardBatch<'_>,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        let iface = HidInterface::from_wire(batch.interface);
        let typed = keyboard::type_symbols(
            &mut *ports.keyboard,
            iface,
            batch.delay_ms,
            batch.symbols(),
        );
        if let Err(e) = typed {
            info!("CMD: typing on {iface} aborted: {e}");
        }

        let buf = self
            .transport
            .acquire_send_buffer(SendClass::Reply, MessageType::KeyboardType, ports);
        buf.set_payload_u16(0, u16::from(typed.is_ok()));
        buf.payload_length1 = 2;
        self.transport.send(SendClass::Reply, ports)
    }

    fn type_shortcut(
        &mut self,
        cmd: CommandMessage<'_>,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        let iface = HidInterface::from_wire(u16::from(cmd.arg_u8(0)));
        let shortcut = cmd.arg_u8(1);
        let delay_ms = self.config.shortcut_key_delay_ms;

        let typed = if shortcut & SHORTCUT_ENTER != 0 {
            ports
                .keyboard
                .type_key_with_modifier(iface, KEY_RETURN, 0, delay_ms)
        } else if shortcut & SHORTCUT_CTRL_ALT_DEL != 0 {
            ports
                .keyboard
                .type_key_with_modifier(iface, KEY_DELETE, KEY_RIGHT_ALT | KEY_CTRL, delay_ms)
        } else {
            if shortcut & SHORTCUT_WIN_L != 0 {
                ports.keyboard.type_lock_shortcut(iface, cmd.arg_u16(1) as u8);
            }
            Ok(())
        };
        if let Err(e) = typed {
            info!("CMD: shortcut 0x{shortcut:02x} not typed: {e}");
        }

        self.event(AuxEvent::ShortcutTyped, ports)
    }

    // ── BLE control ──────────────────────────────────────────

    fn ble_command(
        &mut self,
        msg: BleMessage<'_>,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        match BleMessageId::try_from(msg.message_id) {
            Ok(BleMessageId::Enable) => ports.radio.set_to_be_enabled(msg.data),
            Ok(BleMessageId::ClearBondInfo) => {
                ports.radio.clear_bonding_information();
                return self.event(AuxEvent::BondingCleared, ports);
            }
            Ok(BleMessageId::EnablePairing) => ports.radio.set_open_to_pairing(true),
            Ok(BleMessageId::DisablePairing) => ports.radio.set_open_to_pairing(false),
            Ok(BleMessageId::DisconnectForNext) => {
                if ports.radio.temporarily_ban_connected_device() {
                    return self.event(AuxEvent::BleDisconnected, ports);
                }
            }
            _ => self.flag_invalid("BLE command", msg.message_id),
        }
        Ok(())
    }

    // ── Main MCU commands ────────────────────────────────────

    fn main_command(
        &mut self,
        cmd: CommandMessage<'_>,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        let Ok(command) = MainCommand::try_from(cmd.command) else {
            self.flag_invalid("main command", cmd.command);
            return Ok(());
        };
        debug!("CMD: {command:?}");

        match command {
            MainCommand::Sleep => self.enter_sleep(ports),
            MainCommand::AttachUsb => {
                ports.battery.start_using_adc();
                self.hid.clear_enumerated();
                ports.hid.attach_usb();
                self.event(AuxEvent::AttachCommandReceived, ports)
            }
            MainCommand::DetachUsb => {
                self.hid.clear_enumerated();
                ports.hid.detach_usb();
                ports.battery.stop_charging();
                ports.battery.stop_using_adc();
                self.event(AuxEvent::UsbDetached, ports)
            }
            MainCommand::DisableBle => {
                if ports.radio.is_enabled() {
                    ports.radio.set_disable_flag();
                }
                Ok(())
            }
            MainCommand::NimhChargeSlowStart => self.start_charge(ChargeScheme::SlowStart23C, ports),
            MainCommand::NimhRecoveryCharge => self.start_charge(ChargeScheme::Recovery23C, ports),
            MainCommand::NimhCharge => self.start_charge(ChargeScheme::Nimh23C, ports),
            // Retired charge mode
            MainCommand::NimhDangerCharge => Ok(()),
            MainCommand::StopCharge => {
                ports.battery.stop_charging();
                self.event(AuxEvent::ChargeStopped, ports)
            }
            MainCommand::SetBatteryLevel => {
                ports.radio.set_battery_level(cmd.arg_u8(0));
                self.event(AuxEvent::NewBatteryLevelReceived, ports)
            }
            MainCommand::GetStatus => self.reply_status(ports),
            MainCommand::NoCommsUnavailable => {
                ports.no_comms.set_unavailable();
                self.event(AuxEvent::NoCommsInfoReceived, ports)
            }
            // The radio stack reports DTM results itself
            MainCommand::DtmRxStart => {
                ports.radio.dtm_rx(cmd.arg_u16(0));
                Ok(())
            }
            MainCommand::TxToneContinuous => {
                ports
                    .radio
                    .tx_tone(cmd.arg_u16(0), cmd.arg_u16(1), cmd.arg_u16(2));
                Ok(())
            }
            MainCommand::DtmStop => {
                ports.radio.stop_tone();
                Ok(())
            }
            MainCommand::ForceChargeVoltage => {
                ports.battery.debug_force_charge_voltage(cmd.arg_u16(0));
                Ok(())
            }
            MainCommand::StopForceCharge => {
                ports.battery.debug_stop_charge();
                Ok(())
            }
            MainCommand::FunctionalTest => {
                let result = functest::run(ports);
                let buf = self
                    .transport
                    .acquire_send_buffer(SendClass::Reply, MessageType::AuxEvent, ports);
                EventMessage::write(buf, AuxEvent::FunctionalTestDone, &[result.code()]);
                self.transport.send(SendClass::Reply, ports)
            }
            MainCommand::UpdateDeviceStatus => {
                let mut status = [0u8; DEVICE_STATUS_LEN];
                status.copy_from_slice(&cmd.args[..DEVICE_STATUS_LEN]);
                self.hid.update_status_cache(status);
                self.event(AuxEvent::NewStatusReceived, ports)
            }
            MainCommand::TypeShortcut => self.type_shortcut(cmd, ports),
        }
    }

    fn start_charge(
        &mut self,
        scheme: ChargeScheme,
        ports: &mut Ports<'_>,
    ) -> Result<(), TransportError> {
        info!("CMD: charging with {scheme:?}");
        ports.battery.start_charging(scheme);
        self.event(AuxEvent::ChargeStarted, ports)
    }

    /// Acknowledge, then either go to standby (radio off) or let the main
    /// MCU sleep alone and wake it on the next send (radio on).
    fn enter_sleep(&mut self, ports: &mut Ports<'_>) -> Result<(), TransportError> {
        // An early-dispatched SLEEP still has its zero tail in flight
        let rx = self.rx;
        if !ports.wait_until(self.config.main_wait_timeout_ms, |_| {
            !rx.answered_early(LogicalInterface::Other)
        }) {
            warn!("CMD: sleep message tail never landed, sleeping anyway");
        }

        self.event(AuxEvent::SleepReceived, ports)?;
        if let Err(e) = self.transport.wait_idle(ports) {
            warn!("CMD: sleep ack still in flight: {e}");
        }

        let now = ports.clock.now_ms();
        ports.delay.delay_ms(1);

        if ports.radio.is_enabled() {
            info!("CMD: main MCU sleeping, radio stays up");
            self.transport.request_peer_sleep(now);
        } else {
            info!("CMD: entering standby");
            ports.platform.disable_main_comms();
            ports.platform.standby_sleep();
            ports.platform.enable_main_comms();
            self.transport.begin_receive();
            info!("CMD: woke from standby");
        }
        Ok(())
    }
}
