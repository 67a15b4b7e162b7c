//! **desfire-aes**: host-side session driver for DESFire AES contactless smart cards
//!
//! ## Prerequisites
//!
//! This crate builds on stable Rust and by default uses SIMD-accelerated AES
//! which requires the following `RUSTFLAGS`:
//!
//! `RUSTFLAGS=-Ctarget-feature=+aes`
//!
//! You can configure your `~/.cargo/config` to always pass these flags:
//!
//! ```toml
//! [build]
//! rustflags = ["-Ctarget-feature=+aes"]
//! ```
//!
//! # Getting Started
//!
//! This crate implements the DESFire "native" wire protocol: authentication,
//! the CMAC/CBC secure channel, and the card's command surface. It does not
//! implement a reader driver; callers supply one by implementing
//! [`reader::CardTransport`].
//!
//! * [`session::Session`]: a session bound to one authenticated card.
//! * [`command`]: wrappers for every supported card command.
//!
//! # Example
//!
//! ```no_build
//! use desfire_aes::{session::Session, reader::CardTransport};
//!
//! let transport = MyPn532Transport::open()?;
//! let mut session = Session::new(transport);
//! session.authenticate(0, &master_key)?;
//! let uid = session.get_uid()?;
//! println!("UID: {:?}", uid);
//! ```

#![crate_name = "desfire_aes"]
#![crate_type = "rlib"]
#![deny(warnings, missing_docs, trivial_casts, trivial_numeric_casts)]
#![deny(unsafe_code, unused_import_braces, unused_qualifications)]
#![doc(html_root_url = "https://docs.rs/desfire-aes/0.1.0")]

#[macro_use]
extern crate log;

/// Error types returned by the driver
pub mod error;

/// Cryptographic primitives: CBC cipher adapter, CRC32/JAMCRC, randomness
pub mod crypto;

/// Reader/transport abstraction: the single primitive a card reader must supply
pub mod reader;

/// Authenticated sessions with a DESFire card: handshake, CMAC engine, state
pub mod session;

/// The command transceiver (`dx`): framing, fragmentation, encryption, status dispatch
pub mod transceiver;

/// Commands supported by DESFire AES cards.
///
/// Functions defined in `desfire_aes::command` operate on a [`session::Session`]
/// and are also reimported at the crate root.
pub mod command;

pub use command::CommandCode;
pub use error::{DfError, DfErrorKind};
pub use reader::{CardTransport, TransportError};
pub use session::Session;
