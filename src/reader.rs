//! Reader/transport abstraction.
//!
//! The core driver consumes exactly one operation from the physical reader:
//! exchange one APDU with the card. The concrete reader (a PN532 front-end
//! over a serial UART, in the system this was distilled from) is out of
//! scope for this crate; callers implement [`CardTransport`] themselves.

use thiserror::Error;

/// A single card APDU exchange primitive.
///
/// Implementations must not reorder or fragment frames: one call to
/// `exchange` is one card transaction.
pub trait CardTransport {
    /// Transmit `tx` and receive up to `rx_cap` bytes: the card's status
    /// byte followed by its reply payload. An empty return value signals
    /// that the card did not respond (removed from the field).
    fn exchange(&mut self, tx: &[u8], rx_cap: usize) -> Result<Vec<u8>, TransportError>;
}

/// Errors a [`CardTransport`] implementation may report
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying transport (serial port, USB, etc) failed
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The transport timed out waiting for a reply
    #[error("transport timed out")]
    Timeout,

    /// The transport could not accept a frame of the requested size
    #[error("frame too large for transport")]
    FrameTooLarge,
}
