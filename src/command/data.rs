//! Data, value, and record file I/O.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{ensure, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

use super::flags::CommsMode;
use super::CommandCode;

fn le24(value: u32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

/// Write `data` to a standard/backup file at `offset`, protected per `comms`.
pub fn write_data<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    offset: u32,
    data: &[u8],
    comms: CommsMode,
) -> Result<(), DfError> {
    let mut payload = vec![file_no];
    payload.extend_from_slice(&le24(offset));
    payload.extend_from_slice(&le24(data.len() as u32));
    let header_len = payload.len();
    payload.extend_from_slice(data);

    let tx_mode = if comms.contains(CommsMode::ENC) {
        TxMode::Encrypted {
            leading: 1 + header_len as u8,
        }
    } else if comms.contains(CommsMode::CMAC) {
        TxMode::AppendCmac
    } else {
        TxMode::Plain
    };

    session.dx(CommandCode::WriteData.to_u8(), &payload, tx_mode, RxMode::Plain)?;
    Ok(())
}

/// Read `len` bytes from a standard/backup file starting at `offset`.
pub fn read_data<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    offset: u32,
    len: u32,
    comms: CommsMode,
) -> Result<Vec<u8>, DfError> {
    let mut payload = vec![file_no];
    payload.extend_from_slice(&le24(offset));
    payload.extend_from_slice(&le24(len));

    let rx_mode = if comms.contains(CommsMode::ENC) {
        ensure!(len <= 255, DfErrorKind::ParameterError, "encrypted read_data is limited to 255 bytes");
        RxMode::Encrypted {
            expected_plain: len as u8,
        }
    } else {
        RxMode::Plain
    };

    let reply = session.dx(CommandCode::ReadData.to_u8(), &payload, TxMode::Plain, rx_mode)?;
    Ok(reply[1..].to_vec())
}

/// Write `data` into the record currently being composed in a linear/cyclic
/// record file, at byte `offset` within that record, protected per `comms`.
/// The card always appends to the next free record slot; `offset` only
/// selects where within that record's bytes this write lands, mirroring
/// [`write_data`]'s offset/length header shape.
pub fn write_record<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    offset: u32,
    data: &[u8],
    comms: CommsMode,
) -> Result<(), DfError> {
    let mut payload = vec![file_no];
    payload.extend_from_slice(&le24(offset));
    payload.extend_from_slice(&le24(data.len() as u32));
    let header_len = payload.len();
    payload.extend_from_slice(data);

    let tx_mode = if comms.contains(CommsMode::ENC) {
        TxMode::Encrypted {
            leading: 1 + header_len as u8,
        }
    } else if comms.contains(CommsMode::CMAC) {
        TxMode::AppendCmac
    } else {
        TxMode::Plain
    };

    session.dx(CommandCode::WriteRecord.to_u8(), &payload, tx_mode, RxMode::Plain)?;
    Ok(())
}

/// Read `count` fixed-size records (each `record_size` bytes) starting at
/// record `start`, counting backwards from the most recent (`start = 0`).
pub fn read_records<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    start: u32,
    count: u32,
    record_size: u32,
    comms: CommsMode,
) -> Result<Vec<u8>, DfError> {
    let mut payload = vec![file_no];
    payload.extend_from_slice(&le24(start));
    payload.extend_from_slice(&le24(count));

    let expected_bytes = count * record_size;
    let rx_mode = if comms.contains(CommsMode::ENC) {
        ensure!(
            expected_bytes <= 255,
            DfErrorKind::ParameterError,
            "encrypted read_records is limited to 255 total bytes"
        );
        RxMode::Encrypted {
            expected_plain: expected_bytes as u8,
        }
    } else {
        RxMode::Plain
    };

    let reply = session.dx(CommandCode::ReadRecords.to_u8(), &payload, TxMode::Plain, rx_mode)?;
    Ok(reply[1..].to_vec())
}

/// Read a value file's current balance.
pub fn get_value<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    comms: CommsMode,
) -> Result<i32, DfError> {
    let rx_mode = if comms.contains(CommsMode::ENC) {
        RxMode::Encrypted { expected_plain: 4 }
    } else {
        RxMode::Plain
    };
    let reply = session.dx(CommandCode::GetValue.to_u8(), &[file_no], TxMode::Plain, rx_mode)?;
    Ok(LittleEndian::read_i32(&reply[1..5]))
}

fn value_op<R: CardTransport>(
    session: &mut Session<R>,
    cmd: u8,
    file_no: u8,
    amount: i32,
    comms: CommsMode,
) -> Result<(), DfError> {
    let mut payload = vec![file_no];
    payload.extend_from_slice(&amount.to_le_bytes());

    let tx_mode = if comms.contains(CommsMode::CMAC) {
        TxMode::AppendCmac
    } else {
        TxMode::Plain
    };

    session.dx(cmd, &payload, tx_mode, RxMode::Plain)?;
    Ok(())
}

/// Add `amount` to a value file's balance (committed on the next `Commit`).
pub fn credit<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    amount: i32,
    comms: CommsMode,
) -> Result<(), DfError> {
    value_op(session, CommandCode::Credit.to_u8(), file_no, amount, comms)
}

/// Like [`credit`], but only usable when the file's limited-credit option
/// is enabled (allows crediting without the full change-key-level auth a
/// plain credit requires on some configurations).
pub fn limited_credit<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    amount: i32,
    comms: CommsMode,
) -> Result<(), DfError> {
    value_op(session, CommandCode::LimitedCredit.to_u8(), file_no, amount, comms)
}

/// Subtract `amount` from a value file's balance (committed on the next `Commit`).
pub fn debit<R: CardTransport>(
    session: &mut Session<R>,
    file_no: u8,
    amount: i32,
    comms: CommsMode,
) -> Result<(), DfError> {
    value_op(session, CommandCode::Debit.to_u8(), file_no, amount, comms)
}
