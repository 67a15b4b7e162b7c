//! Authenticated sessions with a DESFire card.
//!
//! A [`Session`] owns the reader transport and all per-card cryptographic
//! state: the active cipher, the session key and CMAC subkeys, and the
//! running CMAC/CBC chaining value. `&mut Session` access is required for
//! every command, which is this crate's substitute for an explicit session
//! lock: the borrow checker already serializes command calls on one session.

mod securechannel;

pub use securechannel::AuthVariant;

use zeroize::Zeroize;

use crate::crypto::Cipher;
use crate::reader::CardTransport;

/// An authenticated (or not-yet-authenticated) session with one DESFire card.
///
/// `Session` owns its reader `transport` by value: it is never shared
/// across sessions, and dropping the session drops the transport along
/// with it. Key material is zeroized on drop.
pub struct Session<R: CardTransport> {
    pub(crate) transport: R,

    /// `None` when unauthenticated (`block_len == 0` in the original model).
    pub(crate) cipher: Option<Cipher>,

    /// Key slot last authenticated against.
    pub(crate) key_no: u8,

    /// Session key.
    pub(crate) sk0: [u8; 16],

    /// CMAC subkey 1.
    pub(crate) sk1: [u8; 16],

    /// CMAC subkey 2.
    pub(crate) sk2: [u8; 16],

    /// Running CBC chaining value, shared between CMAC accumulation and
    /// encryption IV state.
    pub(crate) cmac_iv: [u8; 16],

    /// Currently selected application id; `000000` is the PICC/master level.
    pub(crate) aid: [u8; 3],

    /// UID cached from a prior `GetUID` call, if any.
    pub(crate) uid: Option<[u8; 7]>,
}

impl<R: CardTransport> Session<R> {
    /// Wrap a reader transport in a fresh, unauthenticated session.
    pub fn new(transport: R) -> Self {
        Session {
            transport,
            cipher: None,
            key_no: 0,
            sk0: [0u8; 16],
            sk1: [0u8; 16],
            sk2: [0u8; 16],
            cmac_iv: [0u8; 16],
            aid: [0u8; 3],
            uid: None,
        }
    }

    /// Whether the session currently holds an authenticated key.
    pub fn is_authenticated(&self) -> bool {
        self.cipher.is_some()
    }

    /// The block length of the active cipher, or 0 if unauthenticated.
    pub(crate) fn block_len(&self) -> usize {
        self.cipher.map(Cipher::block_len).unwrap_or(0)
    }

    /// Clear all session key material and mark the session unauthenticated.
    /// Called on any protocol error and whenever authentication/app-select
    /// is (re)issued.
    pub(crate) fn deauthenticate(&mut self) {
        self.cipher = None;
        self.sk0.zeroize();
        self.sk1.zeroize();
        self.sk2.zeroize();
        self.cmac_iv.zeroize();
    }

    /// The currently selected application id (`000000` = PICC/master level).
    pub fn application_id(&self) -> [u8; 3] {
        self.aid
    }

    /// The card UID cached from the last successful `GetUID`, if any.
    pub fn cached_uid(&self) -> Option<[u8; 7]> {
        self.uid
    }
}

impl<R: CardTransport> Drop for Session<R> {
    fn drop(&mut self) {
        self.sk0.zeroize();
        self.sk1.zeroize();
        self.sk2.zeroize();
        self.cmac_iv.zeroize();
    }
}
