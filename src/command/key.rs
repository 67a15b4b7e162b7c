//! Key management: settings, versions, and the `ChangeKey` dual-CRC wire
//! format.

use crate::crypto;
use crate::error::{ensure, fail, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

use super::flags::KeySettings;
use super::CommandCode;

/// Read the application/master key settings and key count.
///
/// Card firmware revisions disagree on whether this reply carries 2 or 3
/// bytes (settings byte, max-keys byte, and an optional reserved byte);
/// both are accepted.
pub fn get_key_settings<R: CardTransport>(session: &mut Session<R>) -> Result<(KeySettings, u8), DfError> {
    let reply = session.dx(CommandCode::GetKeySettings.to_u8(), &[], TxMode::Plain, RxMode::Plain)?;
    let payload = &reply[1..];
    if payload.len() < 2 || payload.len() > 3 {
        fail!(DfErrorKind::BadReplyLength, "unexpected key-settings reply length");
    }
    Ok((KeySettings::from_bits_truncate(payload[0]), payload[1]))
}

/// Read the version byte of key slot `key_no`.
pub fn get_key_version<R: CardTransport>(session: &mut Session<R>, key_no: u8) -> Result<u8, DfError> {
    let reply = session.dx(
        CommandCode::GetKeyVersion.to_u8(),
        &[key_no],
        TxMode::Plain,
        RxMode::Plain,
    )?;
    let payload = &reply[1..];
    if payload.len() != 1 {
        fail!(DfErrorKind::BadReplyLength, "expected 1-byte key version reply");
    }
    Ok(payload[0])
}

/// Change the settings bits of the currently selected application (or the
/// PICC master key settings, if no application is selected).
pub fn change_key_settings<R: CardTransport>(
    session: &mut Session<R>,
    settings: KeySettings,
) -> Result<(), DfError> {
    session.dx(
        CommandCode::ChangeKeySettings.to_u8(),
        &[settings.bits()],
        TxMode::Encrypted { leading: 1 },
        RxMode::Plain,
    )?;
    Ok(())
}

/// Change a PICC-level configuration byte (e.g. disable format, enable
/// random UID). Requires authentication with the PICC master key; `option`
/// and `data` are card-firmware-specific and passed through unvalidated.
pub fn set_configuration<R: CardTransport>(
    session: &mut Session<R>,
    option: u8,
    data: &[u8],
) -> Result<(), DfError> {
    let mut payload = vec![option];
    payload.extend_from_slice(data);
    let leading = payload.len() as u8;
    session.dx(
        CommandCode::SetConfiguration.to_u8(),
        &payload,
        TxMode::Encrypted { leading },
        RxMode::Plain,
    )?;
    Ok(())
}

/// Change key slot `key_no` to `new_key` (tagged with `version`).
///
/// `key_no` is the raw wire byte: for the master key, bit 7 may be set to
/// force the card to (re)create the slot as an AES key (used once, during
/// the DES-to-AES migration step of [`super::auth::format`]). Which CRC
/// shape applies is decided by the *masked* slot number (`key_no & 0x0F`)
/// against the currently authenticated key, not by the raw byte.
///
/// When the masked `key_no` is the currently authenticated key, `old_key`
/// may be omitted: the wire payload carries the new key plus one CRC over
/// `(cmd, key_no, new_key, version)` — computed over the *plain* new key,
/// before any XOR. When changing a *different* key slot, `old_key` is
/// required: the wire payload carries `new_key XOR old_key` plus that same
/// CRC *and* a second CRC over the plain `new_key` alone, so the card can
/// verify both the outgoing and incoming key material in one shot. If the
/// masked `key_no` is the key the session just authenticated with, the card
/// requires a fresh authentication before any further command; this
/// function does not re-authenticate on the caller's behalf.
pub fn change_key<R: CardTransport>(
    session: &mut Session<R>,
    key_no: u8,
    version: u8,
    new_key: &[u8],
    old_key: Option<&[u8]>,
) -> Result<(), DfError> {
    let cmd = CommandCode::ChangeKey.to_u8();
    let changing_auth_key = session.is_authenticated() && (key_no & 0x0F) == session.key_no;

    let mut check_buf = vec![cmd, key_no];
    check_buf.extend_from_slice(new_key);
    check_buf.push(version);
    let crc1 = crypto::crc32_jam(&check_buf);

    let mut payload = vec![key_no];
    let content = if changing_auth_key {
        new_key.to_vec()
    } else {
        let old_key = old_key.ok_or_else(|| {
            DfError::new(
                DfErrorKind::ParameterError,
                Some("old_key is required when changing a key other than the authenticated one".into()),
            )
        })?;
        ensure!(
            old_key.len() == new_key.len(),
            DfErrorKind::ParameterError,
            "old_key and new_key must be the same length"
        );
        new_key
            .iter()
            .zip(old_key.iter())
            .map(|(n, o)| n ^ o)
            .collect()
    };
    payload.extend_from_slice(&content);
    payload.push(version);
    payload.extend_from_slice(&crc1.to_le_bytes());

    if !changing_auth_key {
        let crc2 = crypto::crc32_jam(new_key);
        payload.extend_from_slice(&crc2.to_le_bytes());
    }

    session.dx(cmd, &payload, TxMode::Encrypted { leading: 2 }, RxMode::Plain)?;
    Ok(())
}
