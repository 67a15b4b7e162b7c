//! Cryptographic primitives adapter.
//!
//! This module is the only place the actual block cipher and CRC
//! implementations are named; everything above it (the CMAC engine, the
//! transceiver) only ever sees [`Cipher`], [`cbc_encrypt`]/[`cbc_decrypt`],
//! and [`crc32_jam`]. Built on the same `aes`/`cbc` RustCrypto family used
//! for NTAG42x/DESFire-adjacent crypto elsewhere in this ecosystem.

mod error;

pub use error::CryptoError;

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use crc::{Crc, CRC_32_JAMCRC};
use des::{Des, TdesEde3};
use rand::RngCore;

/// The JAMCRC algorithm DESFire uses to checksum encrypted payloads:
/// polynomial `0xEDB88320`, init `0xFFFFFFFF`, reflected, no final XOR.
const JAMCRC: Crc<u32> = Crc::<u32>::new(&CRC_32_JAMCRC);

/// Which block cipher a session is operating under.
///
/// AES-128 is the normal case; the 8-byte-block variants exist only to
/// run the legacy authentication handshake used to migrate a card from a
/// DES/3DES master key to an AES one.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Cipher {
    /// AES-128-CBC, 16-byte blocks
    Aes128,
    /// Single DES-CBC, 8-byte blocks (legacy, migration only)
    Des,
    /// 3DES-EDE (two or three key) CBC, 8-byte blocks (legacy, migration only)
    TdesEde3,
}

impl Cipher {
    /// Block length in bytes for this cipher: 16 for AES, 8 for the legacy ciphers.
    pub fn block_len(self) -> usize {
        match self {
            Cipher::Aes128 => 16,
            Cipher::Des | Cipher::TdesEde3 => 8,
        }
    }

    /// The CMAC subkey constant `R` used when deriving SK1/SK2 (NIST SP 800-38B):
    /// `0x87` for a 16-byte block, `0x1B` for an 8-byte block.
    pub fn subkey_r(self) -> u8 {
        match self.block_len() {
            16 => 0x87,
            _ => 0x1B,
        }
    }

    /// Run a single known-answer CBC encryption to confirm this cipher's
    /// implementation is usable. Supplements the original driver's
    /// `df_check_des` startup self-test (DES support is sometimes compiled
    /// out of embedded OpenSSL builds); useful before attempting a
    /// DES-to-AES key migration.
    pub fn self_test(self) -> Result<(), CryptoError> {
        let block_len = self.block_len();
        let key = vec![0u8; block_len];
        let iv = vec![0u8; block_len];
        let mut data = vec![0u8; block_len];
        let mut iv_mut = iv.clone();
        cbc_encrypt(self, &key, &mut iv_mut, &mut data)?;
        let mut iv_mut = iv;
        cbc_decrypt(self, &key, &mut iv_mut, &mut data)?;
        if data != vec![0u8; block_len] {
            return Err(CryptoError::CipherFailure);
        }
        Ok(())
    }
}

/// CBC-encrypt `data` in place under `key`/`iv` (no padding: `data.len()`
/// must be a positive multiple of the cipher's block length). On success
/// `iv` is updated to the last ciphertext block, ready to chain into the
/// next call.
pub fn cbc_encrypt(
    cipher: Cipher,
    key: &[u8],
    iv: &mut [u8],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let block_len = cipher.block_len();
    check_len(data.len(), block_len)?;

    match cipher {
        Cipher::Aes128 => {
            let mut enc = cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            enc.encrypt_padded_mut::<NoPadding>(data, data.len())
                .map_err(|_| CryptoError::CipherFailure)?;
        }
        Cipher::Des => {
            let mut enc = cbc::Encryptor::<Des>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            enc.encrypt_padded_mut::<NoPadding>(data, data.len())
                .map_err(|_| CryptoError::CipherFailure)?;
        }
        Cipher::TdesEde3 => {
            let mut enc = cbc::Encryptor::<TdesEde3>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            enc.encrypt_padded_mut::<NoPadding>(data, data.len())
                .map_err(|_| CryptoError::CipherFailure)?;
        }
    }

    iv.copy_from_slice(&data[data.len() - block_len..]);
    Ok(())
}

/// CBC-decrypt `data` in place under `key`/`iv` (no padding). On success
/// `iv` is updated to the last *ciphertext* block that was supplied (not
/// to the decrypted plaintext), matching DESFire's chaining convention.
pub fn cbc_decrypt(
    cipher: Cipher,
    key: &[u8],
    iv: &mut [u8],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let block_len = cipher.block_len();
    check_len(data.len(), block_len)?;

    let next_iv = data[data.len() - block_len..].to_vec();

    match cipher {
        Cipher::Aes128 => {
            let mut dec = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            dec.decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| CryptoError::CipherFailure)?;
        }
        Cipher::Des => {
            let mut dec = cbc::Decryptor::<Des>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            dec.decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| CryptoError::CipherFailure)?;
        }
        Cipher::TdesEde3 => {
            let mut dec = cbc::Decryptor::<TdesEde3>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::BadKeyLength)?;
            dec.decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| CryptoError::CipherFailure)?;
        }
    }

    iv.copy_from_slice(&next_iv);
    Ok(())
}

fn check_len(len: usize, block_len: usize) -> Result<(), CryptoError> {
    if len == 0 || len % block_len != 0 {
        return Err(CryptoError::BadLength { len, block_len });
    }
    Ok(())
}

/// DESFire's JAMCRC over `data`: polynomial `0xEDB88320`, init `0xFFFFFFFF`,
/// reflected input/output, no final XOR.
pub fn crc32_jam(data: &[u8]) -> u32 {
    JAMCRC.checksum(data)
}

/// `n` cryptographically-sourced random bytes, used to generate the host's
/// half of the authentication challenge. Failure of the OS RNG is treated
/// as an unrecoverable host condition and panics, matching the severity
/// (if not the exact exit mechanism) of the original driver's `err(1,
/// "random")` abort-on-RNG-failure behavior.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::thread_rng()
        .try_fill_bytes(&mut buf)
        .expect("system RNG failure");
    buf
}
