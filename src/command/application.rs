//! Application management: create, delete, enumerate.

use crate::error::DfError;
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

use super::flags::KeySettings;
use super::CommandCode;

/// Create a new application with the given AID, key settings, and key
/// count. The high bit of the key-count byte is set to force AES keys
/// (rather than 3DES), matching every application this driver creates.
pub fn create_application<R: CardTransport>(
    session: &mut Session<R>,
    aid: [u8; 3],
    settings: KeySettings,
    num_keys: u8,
) -> Result<(), DfError> {
    let payload = [aid[0], aid[1], aid[2], settings.bits(), num_keys | 0x80];
    session.dx(
        CommandCode::CreateApplication.to_u8(),
        &payload,
        TxMode::Plain,
        RxMode::Plain,
    )?;
    Ok(())
}

/// Delete the application with the given AID.
pub fn delete_application<R: CardTransport>(session: &mut Session<R>, aid: [u8; 3]) -> Result<(), DfError> {
    session.dx(CommandCode::DeleteApplication.to_u8(), &aid, TxMode::Plain, RxMode::Plain)?;
    Ok(())
}

/// List the AIDs of every application on the card.
pub fn get_application_ids<R: CardTransport>(session: &mut Session<R>) -> Result<Vec<[u8; 3]>, DfError> {
    let reply = session.dx(CommandCode::GetApplicationIds.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    let payload = &reply[1..];
    Ok(payload
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}
