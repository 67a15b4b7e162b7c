//! Card-level housekeeping commands: select application, identify, and
//! commit/abort a pending transaction.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{fail, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

use super::CommandCode;

/// Card hardware/software version and production information, as returned
/// by `GetVersion`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct VersionInfo {
    /// Raw 28-byte payload: hardware info (7), software info (7), UID (7),
    /// batch number (5), and production year/week (2).
    pub raw: Vec<u8>,
}

/// Select an application by its 3-byte AID. `[0, 0, 0]` selects the
/// PICC/master level. Always invalidates any current authentication,
/// whether or not the select itself succeeds.
pub fn select_application<R: CardTransport>(session: &mut Session<R>, aid: [u8; 3]) -> Result<(), DfError> {
    session.dx(CommandCode::SelectApplication.to_u8(), &aid, TxMode::Plain, RxMode::Plain)?;
    session.aid = aid;
    Ok(())
}

/// Read the card's hardware/software version and production info.
pub fn get_version<R: CardTransport>(session: &mut Session<R>) -> Result<VersionInfo, DfError> {
    let reply = session.dx(CommandCode::GetVersion.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    Ok(VersionInfo {
        raw: reply[1..].to_vec(),
    })
}

/// Read the card's 7-byte UID. The reply is always encrypted, so this
/// requires an authenticated session. Caches the UID on the session.
pub fn get_uid<R: CardTransport>(session: &mut Session<R>) -> Result<[u8; 7], DfError> {
    let reply = session.dx(
        CommandCode::GetUid.to_u8(),
        &[],
        TxMode::Plain,
        RxMode::Encrypted { expected_plain: 7 },
    )?;
    let mut uid = [0u8; 7];
    uid.copy_from_slice(&reply[1..8]);
    session.uid = Some(uid);
    Ok(uid)
}

/// Commit a pending transaction (persist backup-file writes since the last
/// commit/abort).
pub fn commit<R: CardTransport>(session: &mut Session<R>) -> Result<(), DfError> {
    session.dx(CommandCode::Commit.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// Abort a pending transaction (roll back backup-file writes since the
/// last commit/abort).
pub fn abort<R: CardTransport>(session: &mut Session<R>) -> Result<(), DfError> {
    session.dx(CommandCode::Abort.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// Read the card's free EEPROM space, in bytes.
pub fn get_free_memory<R: CardTransport>(session: &mut Session<R>) -> Result<u32, DfError> {
    let reply = session.dx(CommandCode::GetFreeMemory.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    let payload = &reply[1..];
    if payload.len() != 3 {
        fail!(DfErrorKind::BadReplyLength, "expected 3-byte free memory reply");
    }
    let mut buf = [0u8; 4];
    buf[..3].copy_from_slice(payload);
    Ok(LittleEndian::read_u32(&buf))
}
