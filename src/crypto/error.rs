//! Errors from the cryptographic primitives adapter

use thiserror::Error;

/// Errors returned by [`super::cbc_encrypt`]/[`super::cbc_decrypt`] and friends
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum CryptoError {
    /// Plaintext/ciphertext length was not a positive multiple of the block length
    #[error("data length {len} is not a multiple of the {block_len}-byte block size")]
    BadLength {
        /// Length that was supplied
        len: usize,
        /// Expected block length (8 or 16)
        block_len: usize,
    },

    /// Key material was the wrong size for the selected cipher
    #[error("invalid key length for cipher")]
    BadKeyLength,

    /// The underlying block cipher implementation rejected the operation
    #[error("block cipher operation failed")]
    CipherFailure,
}
