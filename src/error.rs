//! Error types used by this library

use std::fmt::{self, Display};

use thiserror::Error;

/// Placeholder for when we have no description for an error
const NO_DESCRIPTION: &str = "(no description)";

/// Top-level error type returned by driver operations.
///
/// Wraps a [`DfErrorKind`] plus an optional human-readable description,
/// mirroring the kind/description split used throughout this crate's
/// component errors ([`crate::crypto::CryptoError`], [`crate::reader::TransportError`]).
#[derive(Debug)]
pub struct DfError {
    kind: DfErrorKind,
    description: Option<String>,
}

impl DfError {
    /// Create a new error from its kind, with an optional description
    pub fn new(kind: DfErrorKind, description: Option<String>) -> Self {
        Self { kind, description }
    }

    /// Obtain the error's kind
    pub fn kind(&self) -> DfErrorKind {
        self.kind
    }
}

impl Display for DfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.description {
            None => Display::fmt(&self.kind, f),
            Some(ref desc) if desc == NO_DESCRIPTION => Display::fmt(&self.kind, f),
            Some(ref desc) => write!(f, "{}: {}", self.kind, desc),
        }
    }
}

impl std::error::Error for DfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<DfErrorKind> for DfError {
    fn from(kind: DfErrorKind) -> Self {
        DfError::new(kind, None)
    }
}

impl From<crate::crypto::CryptoError> for DfError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        DfError::new(DfErrorKind::CryptoFailure, Some(err.to_string()))
    }
}

impl From<crate::reader::TransportError> for DfError {
    fn from(err: crate::reader::TransportError) -> Self {
        DfError::new(DfErrorKind::ReaderError, Some(err.to_string()))
    }
}

/// The full DESFire status/protocol error taxonomy.
///
/// Variants beginning with a card status byte (`NoChange` .. `FileIntegrity`)
/// come directly from the card's reply status byte; the remaining variants
/// are host/transport-side faults that never appear on the wire.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum DfErrorKind {
    /// 0x0C: no changes done to backup files, commit/abort not necessary
    #[error("no changes made")]
    NoChange,

    /// 0x0E: insufficient NV-memory to complete command
    #[error("out of EEPROM")]
    OutOfEeprom,

    /// 0x1C: command code not supported
    #[error("illegal command")]
    IllegalCommand,

    /// 0x1E: CRC or MAC does not match data / padding bytes invalid
    #[error("integrity error")]
    IntegrityError,

    /// 0x40: file/application referenced does not exist
    #[error("no such file")]
    NoSuchFile,

    /// 0x7E: length of command string invalid
    #[error("length error")]
    LengthError,

    /// 0x97: crypto operation failed on the card
    #[error("crypto error")]
    CardCryptoError,

    /// 0x9D: current configuration/status does not allow this command
    #[error("permission denied")]
    PermissionDenied,

    /// 0x9E: value of a parameter invalid
    #[error("parameter error")]
    ParameterError,

    /// 0xA0: requested application not present
    #[error("application not found")]
    AppNotFound,

    /// 0xAE: current authentication status does not allow this command
    #[error("authentication error")]
    AuthError,

    /// 0xBE: attempt to read/write beyond file limits
    #[error("boundary error")]
    BoundaryError,

    /// 0xC1: unrecoverable error within the card's file structure
    #[error("card integrity error")]
    CardIntegrity,

    /// 0xCA: previous command not fully completed, must be retried
    #[error("command aborted")]
    CommandAborted,

    /// 0xCD: card disabled by an earlier command
    #[error("card disabled")]
    CardDisabled,

    /// 0xCE: count value exceeds limit
    #[error("count error")]
    CountError,

    /// 0xDE: file/application/key already exists
    #[error("duplicate error")]
    DuplicateError,

    /// 0xEE: EEPROM error during read/write
    #[error("EEPROM error")]
    EepromError,

    /// 0xF0: specified file does not exist
    #[error("file not found")]
    FileNotFound,

    /// 0xF1: unrecoverable error within a file's structure
    #[error("file integrity error")]
    FileIntegrity,

    /// Any status byte not covered above
    #[error("unknown card status: 0x{code:02x}")]
    UnknownStatus {
        /// The raw status byte
        code: u8,
    },

    /// Reader returned a zero-length reply: card removed from field
    #[error("card gone")]
    CardGone,

    /// The reader transport itself failed (see [`crate::reader::TransportError`])
    #[error("reader error")]
    ReaderError,

    /// Outgoing buffer could not hold the command plus CRC/padding/CMAC
    #[error("no space to send")]
    TxNoSpace,

    /// Incoming reply exceeded the allowed receive buffer growth
    #[error("no space to receive")]
    RxNoSpace,

    /// A fixed-length reply had an unexpected length
    #[error("unexpected reply length")]
    BadReplyLength,

    /// An encrypted reply's length was not validly block-aligned
    #[error("bad encrypted reply length")]
    BadEncryptedLength,

    /// CRC embedded in a decrypted reply did not match
    #[error("reply CRC mismatch")]
    RxCrcFail,

    /// CMAC embedded in a plain-authenticated reply did not match
    #[error("reply CMAC mismatch")]
    RxCmacFail,

    /// Mutual authentication handshake failed to verify the card's half
    #[error("authentication failed")]
    AuthFailed,

    /// Operation requires an authenticated session and none is active
    #[error("not authenticated")]
    NotAuthenticated,

    /// A cryptographic primitive failed (see [`crate::crypto::CryptoError`])
    #[error("cryptographic primitive failure")]
    CryptoFailure,
}

impl DfErrorKind {
    /// Translate a card status byte into its error kind.
    ///
    /// `0x00` and `0xAF` are not errors and must be handled by the caller
    /// before reaching this translation.
    pub fn from_status_byte(status: u8) -> DfErrorKind {
        match status {
            0x0C => DfErrorKind::NoChange,
            0x0E => DfErrorKind::OutOfEeprom,
            0x1C => DfErrorKind::IllegalCommand,
            0x1E => DfErrorKind::IntegrityError,
            0x40 => DfErrorKind::NoSuchFile,
            0x7E => DfErrorKind::LengthError,
            0x97 => DfErrorKind::CardCryptoError,
            0x9D => DfErrorKind::PermissionDenied,
            0x9E => DfErrorKind::ParameterError,
            0xA0 => DfErrorKind::AppNotFound,
            0xAE => DfErrorKind::AuthError,
            0xBE => DfErrorKind::BoundaryError,
            0xC1 => DfErrorKind::CardIntegrity,
            0xCA => DfErrorKind::CommandAborted,
            0xCD => DfErrorKind::CardDisabled,
            0xCE => DfErrorKind::CountError,
            0xDE => DfErrorKind::DuplicateError,
            0xEE => DfErrorKind::EepromError,
            0xF0 => DfErrorKind::FileNotFound,
            0xF1 => DfErrorKind::FileIntegrity,
            code => DfErrorKind::UnknownStatus { code },
        }
    }
}

/// Create a new error (of a given kind) with a formatted message
macro_rules! err {
    ($kind:expr, $msg:expr) => {
        $crate::error::DfError::new($kind, Some($msg.to_string()))
    };
    ($kind:expr, $fmt:expr, $($arg:tt)+) => {
        err!($kind, &format!($fmt, $($arg)+))
    };
}

/// Create and return an error with a formatted message
macro_rules! fail {
    ($kind:expr, $msg:expr) => {
        return Err(err!($kind, $msg).into());
    };
    ($kind:expr, $fmt:expr, $($arg:tt)+) => {
        fail!($kind, &format!($fmt, $($arg)+));
    };
}

/// Assert a condition is true, returning an error type with a formatted message if not
macro_rules! ensure {
    ($cond:expr, $kind:expr, $msg:expr) => {
        if !($cond) {
            return Err(err!($kind, $msg).into());
        }
    };
    ($cond:expr, $kind:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err(err!($kind, $fmt, $($arg)+).into());
        }
    };
}

pub(crate) use ensure;
pub(crate) use err;
pub(crate) use fail;
