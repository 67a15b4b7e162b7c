//! `Format` orchestration.
//!
//! Formatting a card is not a single command: the caller must already be
//! authenticated with the current master key, which might be the caller's
//! expected key, the factory-default zero AES key, or (for a card that has
//! never left DES/3DES mode) the factory-default zero legacy key. After the
//! card is wiped, its master key reverts to the factory legacy default, so
//! this also re-authenticates and installs an AES master key (and,
//! optionally, the caller's desired key) before returning.

use crate::error::DfError;
use crate::reader::CardTransport;
use crate::session::{AuthVariant, Session};
use crate::transceiver::{RxMode, TxMode};

use super::key::change_key;
use super::CommandCode;

/// Format the card (erasing every application but the PICC level), then
/// bring the master key back to a known AES state.
///
/// If `desired_master_key` is supplied, the card ends up authenticated with
/// (and holding) that 16-byte AES key; otherwise it ends up holding the
/// zero AES key, authenticated.
pub fn format<R: CardTransport>(
    session: &mut Session<R>,
    desired_master_key: Option<&[u8]>,
) -> Result<(), DfError> {
    let zero_aes = [0u8; 16];
    let zero_des = [0u8; 8];

    let mut authenticated = false;
    if let Some(key) = desired_master_key {
        authenticated = session.authenticate(0, key, AuthVariant::Aes).is_ok();
    }
    if !authenticated {
        authenticated = session.authenticate(0, &zero_aes, AuthVariant::Aes).is_ok();
    }
    if !authenticated {
        session.authenticate(0, &zero_des, AuthVariant::LegacyDes)?;
    }

    session.dx(CommandCode::Format.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;

    session.authenticate(0, &zero_des, AuthVariant::LegacyDes)?;
    // Wire key_no 0x80: key slot 0, with the AES-key-type bit set, so the
    // card recreates the slot as AES instead of leaving it DES/3DES.
    change_key(session, 0x80, 1, &zero_aes, None)?;
    session.authenticate(0, &zero_aes, AuthVariant::Aes)?;

    if let Some(desired) = desired_master_key {
        if desired != zero_aes.as_slice() {
            change_key(session, 0, 1, desired, None)?;
            session.authenticate(0, desired, AuthVariant::Aes)?;
        }
    }

    Ok(())
}
