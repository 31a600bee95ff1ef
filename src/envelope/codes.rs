//! Opaque integer code spaces carried inside envelopes.
//!
//! Each space is closed: unknown values decode to `Err(raw)` so the
//! command processor can latch the invalid-message flag instead of
//! guessing.

/// Declare a `#[repr(u16)]` code enum with a checked `TryFrom<u16>`.
macro_rules! wire_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u16)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            pub const fn code(self) -> u16 {
                self as u16
            }
        }

        impl TryFrom<u16> for $name {
            type Error = u16;

            fn try_from(raw: u16) -> Result<Self, u16> {
                match raw {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(other),
                }
            }
        }
    };
}

wire_codes! {
    /// Commands the main MCU sends inside a `MainCommand` envelope.
    pub enum MainCommand {
        Sleep = 0x0001,
        AttachUsb = 0x0002,
        NimhChargeSlowStart = 0x0003,
        NimhRecoveryCharge = 0x0004,
        NimhCharge = 0x0005,
        NoCommsUnavailable = 0x0006,
        TypeShortcut = 0x0007,
        DetachUsb = 0x0008,
        FunctionalTest = 0x0009,
        UpdateDeviceStatus = 0x000A,
        StopCharge = 0x000B,
        SetBatteryLevel = 0x000C,
        GetStatus = 0x000D,
        NimhDangerCharge = 0x000E,
        DisableBle = 0x000F,
        DtmRxStart = 0x1000,
        TxToneContinuous = 0x1001,
        DtmStop = 0x1002,
        ForceChargeVoltage = 0x1003,
        StopForceCharge = 0x1004,
    }
}

wire_codes! {
    /// Events the aux MCU reports inside an `AuxEvent` envelope.
    pub enum AuxEvent {
        BleEnabled = 0x0001,
        BleDisabled = 0x0002,
        TxSweepDone = 0x0003,
        FunctionalTestDone = 0x0004,
        UsbEnumerated = 0x0005,
        ChargeDone = 0x0006,
        ChargeFail = 0x0007,
        SleepReceived = 0x0008,
        ImHere = 0x0009,
        BleConnected = 0x000A,
        BleDisconnected = 0x000B,
        UsbDetached = 0x000C,
        ChargeLevelUpdate = 0x000D,
        UsbTimeout = 0x000E,
        HeresMyStatus = 0x000F,
        AttachCommandReceived = 0x0010,
        ChargeStarted = 0x0011,
        NoCommsInfoReceived = 0x0012,
        ShortcutTyped = 0x0013,
        NewStatusReceived = 0x0014,
        ChargeStopped = 0x0015,
        NewBatteryLevelReceived = 0x0016,
        RxDtmDone = 0x0017,
        BleConnectionSpam = 0x0018,
        BondingCleared = 0x0019,
    }
}

wire_codes! {
    /// Sub-commands of a `BleCommand` envelope.
    pub enum BleMessageId {
        Enable = 0x0001,
        StoreBondInfo = 0x0003,
        RecallBondInfo = 0x0004,
        ClearBondInfo = 0x0005,
        EnablePairing = 0x0006,
        DisablePairing = 0x0007,
        GetIrkKeys = 0x0008,
        RecallBondInfoIrk = 0x0009,
        GetSixDigitCode = 0x000A,
        DisconnectForNext = 0x000B,
    }
}

wire_codes! {
    /// Sub-types of a `Fido2` envelope.
    pub enum Fido2SubType {
        AuthCredRequest = 1,
        AuthCredResponse = 2,
        MakeCredRequest = 3,
        MakeCredResponse = 4,
        GetAssertionRequest = 5,
        GetAssertionResponse = 6,
        /// Main MCU could not take the request yet; resend it.
        Retry = 7,
    }
}

wire_codes! {
    /// Commands of a `Bootloader` envelope.
    pub enum BootloaderCommand {
        StartProgramming = 0,
        Write = 1,
        StartApp = 2,
    }
}

/// Host HID command answered from the local device-status cache.
pub const HID_CMD_GET_DEVICE_STATUS: u16 = 0x0011;

// ── TypeShortcut bit masks ───────────────────────────────────

/// Type Enter.
pub const SHORTCUT_ENTER: u8 = 0x02;
/// Type Win+L (lock workstation).
pub const SHORTCUT_WIN_L: u8 = 0x08;
/// Type Ctrl+Alt+Del.
pub const SHORTCUT_CTRL_ALT_DEL: u8 = 0x10;
