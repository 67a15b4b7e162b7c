//! Mutual authentication handshake and session-key derivation.
//!
//! Structurally this plays the same role as a GlobalPlatform SCP03 secure
//! channel's `EXTERNAL AUTHENTICATE` exchange: host and card each generate a
//! random challenge, each proves possession of the shared key by returning
//! the other's (transformed) challenge, and a session key is derived from
//! both halves. The derivation math itself is DESFire's, not SCP03's: a
//! direct byte-interleave of the two challenge halves rather than an
//! AES-CMAC-based KDF.

mod cmac;

use crate::crypto::{self, Cipher};
use crate::error::{fail, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;
use crate::transceiver::{RxMode, TxMode};

/// Which handshake variant to run: modern AES, or the legacy single-DES
/// (or 3DES) path kept only to migrate a card onto an AES master key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AuthVariant {
    /// AES-128 authentication (command `0xAA`).
    Aes,
    /// Legacy DES authentication (command `0x1A`); yields a single-DES
    /// session with no CMAC subkeys, usable only for a `ChangeKey` to AES.
    LegacyDes,
}

impl<R: CardTransport> Session<R> {
    /// Run the mutual authentication handshake against key slot `key_no`
    /// using `key`, establishing session key material on success.
    pub fn authenticate(&mut self, key_no: u8, key: &[u8], variant: AuthVariant) -> Result<(), DfError> {
        self.deauthenticate();
        self.key_no = key_no;

        let (cmd, cipher) = match variant {
            AuthVariant::Aes => (0xAAu8, Cipher::Aes128),
            AuthVariant::LegacyDes => (0x1Au8, Cipher::Des),
        };
        let block_len = cipher.block_len();

        let reply1 = self.dx(cmd, &[key_no], TxMode::Plain, RxMode::Plain)?;
        if reply1.len() != 1 + block_len || reply1[0] != 0xAF {
            fail!(DfErrorKind::AuthFailed, "unexpected first handshake reply");
        }
        let b_enc = reply1[1..].to_vec();

        let mut iv = vec![0u8; block_len];
        let mut b = b_enc.clone();
        crypto::cbc_decrypt(cipher, key, &mut iv, &mut b)?;
        // `iv` now holds b_enc itself (the chaining ciphertext), ready to
        // chain into the next encrypt step.

        let a = crypto::random_bytes(block_len);
        let mut plaintext2 = a.clone();
        plaintext2.extend_from_slice(&cmac::rotl1(&b));
        crypto::cbc_encrypt(cipher, key, &mut iv, &mut plaintext2)?;

        let reply2 = self.dx(0xAF, &plaintext2, TxMode::Plain, RxMode::Plain)?;
        if reply2.len() != 1 + block_len || reply2[0] != 0x00 {
            fail!(DfErrorKind::AuthFailed, "unexpected second handshake reply");
        }
        let mut a_enc = reply2[1..].to_vec();
        crypto::cbc_decrypt(cipher, key, &mut iv, &mut a_enc)?;

        if a_enc != cmac::rotl1(&a) {
            fail!(DfErrorKind::AuthFailed, "card failed to prove key possession");
        }

        let mut sk0 = [0u8; 16];
        sk0[0..4].copy_from_slice(&a[0..4]);
        sk0[4..8].copy_from_slice(&b[0..4]);
        if block_len == 16 {
            sk0[8..12].copy_from_slice(&a[12..16]);
            sk0[12..16].copy_from_slice(&b[12..16]);
        }

        let (sk1, sk2) = if block_len == 16 {
            cmac::derive_subkeys(cipher, &sk0[..16])
        } else {
            ([0u8; 16], [0u8; 16])
        };

        self.sk0 = sk0;
        self.sk1 = sk1;
        self.sk2 = sk2;
        self.cmac_iv = [0u8; 16];
        self.cipher = Some(cipher);

        debug!("authenticated against key slot {}", key_no);
        Ok(())
    }
}
