//! Per-call configuration bits exposed to callers.

use bitflags::bitflags;

bitflags! {
    /// Requested comms-mode for a read/write data operation.
    pub struct CommsMode: u8 {
        /// Request (or supply) a CMAC-verified reply/payload.
        const CMAC = 0x01;
        /// Request (or supply) an encrypted, CRC-verified reply/payload.
        const ENC = 0x02;
    }
}

bitflags! {
    /// Master/application key settings bits (as used by `ChangeKeySettings`
    /// and `CreateApplication`).
    pub struct KeySettings: u8 {
        /// The master key itself may be changed.
        const MASTER_CHANGE = 0x01;
        /// Keys may be listed without prior authentication.
        const LIST = 0x02;
        /// Applications/files may be created without prior authentication.
        const CREATE = 0x04;
        /// Key settings may be changed after authentication.
        const CHANGE = 0x08;
    }
}

impl Default for KeySettings {
    /// The card's factory-default settings: all four bits set.
    fn default() -> Self {
        KeySettings::all()
    }
}
