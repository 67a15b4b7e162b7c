//! File management: create, delete, enumerate, and inspect/adjust file
//! settings for the four DESFire file types.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{fail, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

use super::flags::CommsMode;
use super::CommandCode;

/// The four DESFire file types, tagged with their on-wire type byte.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum FileType {
    /// Flat binary blob, overwritten on every write (`0x00`).
    StandardData = 0x00,
    /// Like `StandardData` but writes are rolled back on `Abort` (`0x01`).
    BackupData = 0x01,
    /// Signed 32-bit counter with `Credit`/`Debit`/`LimitedCredit` (`0x02`).
    Value = 0x02,
    /// Fixed-size records, writes fail once full (`0x03`).
    LinearRecord = 0x03,
    /// Fixed-size records, oldest overwritten once full (`0x04`).
    CyclicRecord = 0x04,
}

impl FileType {
    fn from_u8(byte: u8) -> Result<FileType, DfError> {
        Ok(match byte {
            0x00 => FileType::StandardData,
            0x01 => FileType::BackupData,
            0x02 => FileType::Value,
            0x03 => FileType::LinearRecord,
            0x04 => FileType::CyclicRecord,
            _ => fail!(DfErrorKind::ParameterError, "unknown file type byte 0x{:02x}", byte),
        })
    }
}

/// The settings reply for one file, parsed per its type byte.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FileSettings {
    /// Standard or backup data file.
    Data {
        /// Which of the two data file types this is.
        file_type: FileType,
        /// Comms mode bits.
        comms: CommsMode,
        /// Access rights (read/write/read-write/change key nibbles).
        access: u16,
        /// File size in bytes.
        size: u32,
    },
    /// Value file.
    Value {
        /// Comms mode bits.
        comms: CommsMode,
        /// Access rights.
        access: u16,
        /// Minimum allowed value.
        min: i32,
        /// Maximum allowed value.
        max: i32,
        /// Whether `LimitedCredit` is enabled for this file.
        limited_credit_enabled: bool,
    },
    /// Linear or cyclic record file.
    Record {
        /// Which of the two record file types this is.
        file_type: FileType,
        /// Comms mode bits.
        comms: CommsMode,
        /// Access rights.
        access: u16,
        /// Size in bytes of a single record.
        record_size: u32,
        /// Capacity in records.
        max_records: u32,
        /// Records currently written.
        current_records: u32,
    },
}

fn read_u24(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf[..3].copy_from_slice(bytes);
    LittleEndian::read_u32(&buf)
}

fn read_i32(bytes: &[u8]) -> i32 {
    LittleEndian::read_i32(bytes)
}

/// Create a standard or backup data file.
pub fn create_file<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    backup: bool,
    comms: CommsMode,
    access: u16,
    size: u32,
) -> Result<(), DfError> {
    let cmd = if backup {
        CommandCode::CreateBackupDataFile
    } else {
        CommandCode::CreateDataFile
    };
    let mut payload = vec![file_no, comms.bits()];
    payload.extend_from_slice(&access.to_le_bytes());
    payload.extend_from_slice(&size.to_le_bytes()[..3]);
    session.dx(cmd.to_u8(), &payload, TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// Create a value file.
#[allow(clippy::too_many_arguments)]
pub fn create_value_file<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    comms: CommsMode,
    access: u16,
    min: i32,
    max: i32,
    initial_value: i32,
    limited_credit_enabled: bool,
) -> Result<(), DfError> {
    let mut payload = vec![file_no, comms.bits()];
    payload.extend_from_slice(&access.to_le_bytes());
    payload.extend_from_slice(&min.to_le_bytes());
    payload.extend_from_slice(&max.to_le_bytes());
    payload.extend_from_slice(&initial_value.to_le_bytes());
    payload.push(limited_credit_enabled as u8);
    session.dx(
        CommandCode::CreateValueFile.to_u8(),
        &payload,
        TxMode::Plain,
        RxMode::Plain,
    )?;
    Ok(())
}

/// Create a linear or cyclic record file.
pub fn create_record_file<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    cyclic: bool,
    comms: CommsMode,
    access: u16,
    record_size: u32,
    max_records: u32,
) -> Result<(), DfError> {
    let cmd = if cyclic {
        CommandCode::CreateCyclicRecordFile
    } else {
        CommandCode::CreateLinearRecordFile
    };
    let mut payload = vec![file_no, comms.bits()];
    payload.extend_from_slice(&access.to_le_bytes());
    payload.extend_from_slice(&record_size.to_le_bytes()[..3]);
    payload.extend_from_slice(&max_records.to_le_bytes()[..3]);
    session.dx(cmd.to_u8(), &payload, TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// Delete a file.
pub fn delete_file<R: CardTransport>(session: &mut Session<R>, file_no: u8) -> Result<(), DfError> {
    session.dx(CommandCode::DeleteFile.to_u8(), &[file_no], TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// List the file numbers present in the selected application, decoded into
/// a 64-bit bitmap (bit `n` set means file `n` exists).
pub fn get_file_ids<R: CardTransport>(session: &mut Session<R>) -> Result<u64, DfError> {
    let reply = session.dx(CommandCode::GetFileIds.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    let mut bitmap = 0u64;
    for &file_no in &reply[1..] {
        if file_no < 64 {
            bitmap |= 1 << file_no;
        }
    }
    Ok(bitmap)
}

/// Read and parse the settings of one file.
pub fn get_file_settings<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
) -> Result<FileSettings, DfError> {
    let reply = session.dx(
        CommandCode::GetFileSettings.to_u8(),
        &[file_no],
        TxMode::Plain,
        RxMode::Plain,
    )?;
    let payload = &reply[1..];
    if payload.len() < 4 {
        fail!(DfErrorKind::BadReplyLength, "file settings reply too short");
    }

    let file_type = FileType::from_u8(payload[0])?;
    let comms = CommsMode::from_bits_truncate(payload[1]);
    let access = LittleEndian::read_u16(&payload[2..4]);
    let rest = &payload[4..];

    Ok(match file_type {
        FileType::StandardData | FileType::BackupData => {
            if rest.len() != 3 {
                fail!(DfErrorKind::BadReplyLength, "data file settings reply wrong length");
            }
            FileSettings::Data {
                file_type,
                comms,
                access,
                size: read_u24(rest),
            }
        }
        FileType::Value => {
            if rest.len() != 13 {
                fail!(DfErrorKind::BadReplyLength, "value file settings reply wrong length");
            }
            FileSettings::Value {
                comms,
                access,
                min: read_i32(&rest[0..4]),
                max: read_i32(&rest[4..8]),
                limited_credit_enabled: rest[12] != 0,
            }
        }
        FileType::LinearRecord | FileType::CyclicRecord => {
            if rest.len() != 9 {
                fail!(DfErrorKind::BadReplyLength, "record file settings reply wrong length");
            }
            FileSettings::Record {
                file_type,
                comms,
                access,
                record_size: read_u24(&rest[0..3]),
                max_records: read_u24(&rest[3..6]),
                current_records: read_u24(&rest[6..9]),
            }
        }
    })
}

/// Change a file's comms mode and access rights. `currently_free_access`
/// should reflect whether the file's *current* access rights already allow
/// unauthenticated changes (access-rights low nibble `0xE`); in that case
/// the command is sent plain, otherwise encrypted.
pub fn change_file_settings<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    comms: CommsMode,
    access: u16,
    currently_free_access: bool,
) -> Result<(), DfError> {
    let mut payload = vec![file_no, comms.bits()];
    payload.extend_from_slice(&access.to_le_bytes());

    let tx_mode = if currently_free_access {
        TxMode::Plain
    } else {
        TxMode::Encrypted { leading: 2 }
    };
    session.dx(CommandCode::ChangeFileSettings.to_u8(), &payload, tx_mode, RxMode::Plain)?;
    Ok(())
}
