//! The CMAC engine: subkey derivation and the chained CMAC update used both
//! to authenticate outgoing commands and to verify plain-mode replies.
//!
//! Unlike the one-shot `cmac` crate API, DESFire's CMAC is explicitly
//! stateful: it chains across every `dx` call on a session through
//! `cmac_iv`, so it is hand-rolled here directly on top of the block-cipher
//! CBC primitive in [`crate::crypto`] rather than built on a one-shot MAC
//! crate.

use crate::crypto::{self, Cipher};
use crate::reader::CardTransport;
use crate::session::Session;

impl<R: CardTransport> Session<R> {
    /// Chain `data` into the running CMAC/CBC state (`cmac_iv`).
    ///
    /// An empty `data` is a no-op. Otherwise: if `data`'s length is a
    /// positive multiple of the block length, all but the last block is
    /// CBC-encrypted under `sk0`, the last block is XORed with `SK1` and
    /// encrypted; otherwise `data` is padded with `0x80` then zeros to a
    /// block boundary, the padded final block is XORed with `SK2`, and all
    /// blocks are encrypted in sequence. Either way `cmac_iv` ends up
    /// holding the CMAC tag and the IV for the next exchange.
    pub(crate) fn cmac_update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let block_len = self.block_len();
        let cipher = self.cipher.expect("cmac_update requires an authenticated session");

        let mut blocks = data.to_vec();
        let subkey = if !blocks.is_empty() && blocks.len() % block_len == 0 {
            self.sk1
        } else {
            blocks.push(0x80);
            while blocks.len() % block_len != 0 {
                blocks.push(0x00);
            }
            self.sk2
        };

        let last = blocks.len() - block_len;
        for i in 0..block_len {
            blocks[last + i] ^= subkey[i];
        }

        let key = self.sk0[..block_len].to_vec();
        let mut iv = self.cmac_iv[..block_len].to_vec();
        crypto::cbc_encrypt(cipher, &key, &mut iv, &mut blocks)
            .expect("cmac_update operates on block-aligned data under a validated key");
        self.cmac_iv[..block_len].copy_from_slice(&iv);
    }
}

/// Derive the NIST SP 800-38B CMAC subkeys SK1/SK2 from a session key.
///
/// `L` is one zero block encrypted under `sk0` with a zero IV. Each subkey
/// is a 1-bit left shift of its predecessor, conditionally XORed with the
/// cipher's subkey constant `R` (`0x87` for 16-byte blocks, `0x1B` for
/// 8-byte blocks) whenever the shifted-out bit was set.
pub(crate) fn derive_subkeys(cipher: Cipher, sk0: &[u8]) -> ([u8; 16], [u8; 16]) {
    let block_len = cipher.block_len();
    let mut l = vec![0u8; block_len];
    let mut iv = vec![0u8; block_len];
    crypto::cbc_encrypt(cipher, sk0, &mut iv, &mut l).expect("zero-block encrypt cannot fail");

    let r = cipher.subkey_r();
    let sk1_bytes = shift_left_1(&l, r);
    let sk2_bytes = shift_left_1(&sk1_bytes, r);

    let mut sk1 = [0u8; 16];
    let mut sk2 = [0u8; 16];
    sk1[..block_len].copy_from_slice(&sk1_bytes);
    sk2[..block_len].copy_from_slice(&sk2_bytes);
    (sk1, sk2)
}

/// Left-shift `block` by one bit across its whole length, XORing the
/// result with `r` (applied to the last byte) whenever the most
/// significant bit of the input was set.
fn shift_left_1(block: &[u8], r: u8) -> Vec<u8> {
    let msb_set = block[0] & 0x80 != 0;
    let mut out = vec![0u8; block.len()];
    let mut carry = 0u8;
    for i in (0..block.len()).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = (block[i] & 0x80 != 0) as u8;
    }
    if msb_set {
        let last = out.len() - 1;
        out[last] ^= r;
    }
    out
}

/// One-byte left rotation, used on the card's challenge half during the
/// mutual-authentication handshake.
pub(crate) fn rotl1(block: &[u8]) -> Vec<u8> {
    let mut out = block.to_vec();
    out.rotate_left(1);
    out
}
