//! The command transceiver `dx`: the heart of the driver.
//!
//! Given a command byte, a caller-prepared payload, and the transmit/receive
//! modes that command requires, `dx` applies CMAC or encryption+CRC+padding,
//! fragments long sends over the card's `TXMAX`-byte frame limit, collects
//! `0xAF`-continued multi-frame replies, decrypts and validates the result,
//! and dispatches card status bytes into the error taxonomy. Every command
//! wrapper in [`crate::command`] is a thin shim around one call to `dx`.

use byteorder::{ByteOrder, LittleEndian};

use crate::crypto;
use crate::error::{fail, DfError, DfErrorKind};
use crate::reader::CardTransport;
use crate::session::Session;

/// Largest payload the reader will forward to the card in a single frame.
/// Longer sends are split into `TXMAX`-byte chunks acknowledged by `0xAF`.
pub const TXMAX: usize = 55;

/// Receive capacity requested from the transport for a single frame.
const RX_CAP: usize = 64;

/// Authenticate/app-select command codes: issuing any of these always
/// invalidates the current session, and their own `0xAF` status is a
/// legitimate terminal reply rather than a "more data follows" signal.
const SESSION_RESETTING: [u8; 4] = [0x0A, 0x1A, 0xAA, 0x5A];
const AF_IS_HANDSHAKE_STATUS: [u8; 3] = [0x0A, 0x1A, 0xAA];

/// How the outgoing payload of a command is protected.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TxMode {
    /// Sent as-is.
    Plain,
    /// CMAC the payload and append the first 8 bytes of the resulting tag.
    AppendCmac,
    /// Append a CRC32 of the payload (skipped for `ChangeKey`, which builds
    /// its own CRC layout), zero-pad, and CBC-encrypt everything after the
    /// first `leading` plaintext bytes (typically the command byte and any
    /// unencrypted parameter bytes).
    Encrypted {
        /// Count of leading plaintext bytes left unencrypted.
        leading: u8,
    },
}

/// How the incoming reply of a command is validated.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RxMode {
    /// Plain reply, or CMAC-verified if the session requests CMAC replies.
    Plain,
    /// Encrypted reply carrying `expected_plain` bytes of plaintext plus a
    /// trailing CRC32, block-padded.
    Encrypted {
        /// Plaintext length expected before the CRC.
        expected_plain: u8,
    },
}

impl<R: CardTransport> Session<R> {
    /// Run one command exchange: build the frame, protect it per `tx_mode`,
    /// exchange it (fragmenting/reassembling as needed), and validate the
    /// reply per `rx_mode`.
    ///
    /// `payload` excludes the command byte; `dx` prepends it. The returned
    /// buffer has the card's status byte at index 0 followed by the
    /// (decrypted, if applicable) reply payload.
    pub(crate) fn dx(
        &mut self,
        cmd: u8,
        payload: &[u8],
        tx_mode: TxMode,
        rx_mode: RxMode,
    ) -> Result<Vec<u8>, DfError> {
        if SESSION_RESETTING.contains(&cmd) {
            self.deauthenticate();
        }

        let mut frame = Vec::with_capacity(1 + payload.len() + 24);
        frame.push(cmd);
        frame.extend_from_slice(payload);

        if self.block_len() != 0 {
            self.apply_tx_mode(cmd, &mut frame, tx_mode)?;
        }

        trace!("dx: cmd=0x{:02x} tx_len={}", cmd, frame.len());

        let reply = self.send_and_receive(cmd, frame)?;
        self.post_process(reply, rx_mode)
    }

    fn apply_tx_mode(&mut self, cmd: u8, frame: &mut Vec<u8>, tx_mode: TxMode) -> Result<(), DfError> {
        match tx_mode {
            TxMode::Plain => Ok(()),
            TxMode::AppendCmac => {
                self.cmac_update(frame);
                let tag = self.cmac_iv;
                frame.extend_from_slice(&tag[..8]);
                Ok(())
            }
            TxMode::Encrypted { leading } => {
                if cmd != 0xC4 {
                    let crc = crypto::crc32_jam(frame);
                    let mut crc_bytes = [0u8; 4];
                    LittleEndian::write_u32(&mut crc_bytes, crc);
                    frame.extend_from_slice(&crc_bytes);
                }

                let block_len = self.block_len();
                let leading = leading as usize;
                let region_len = frame.len() - leading;
                let pad = (block_len - region_len % block_len) % block_len;
                frame.extend(std::iter::repeat(0u8).take(pad));

                let cipher = self.cipher.expect("block_len != 0 implies a cipher is set");
                let key = self.sk0[..block_len].to_vec();
                let mut iv = self.cmac_iv[..block_len].to_vec();
                crypto::cbc_encrypt(cipher, &key, &mut iv, &mut frame[leading..])?;
                self.cmac_iv[..block_len].copy_from_slice(&iv);
                Ok(())
            }
        }
    }

    /// Send `frame`, fragmenting over `TXMAX` if necessary, and collect the
    /// (possibly `0xAF`-continued) reply into a single buffer with the
    /// latest status byte at index 0.
    fn send_and_receive(&mut self, cmd: u8, frame: Vec<u8>) -> Result<Vec<u8>, DfError> {
        let mut remaining: &[u8] = &frame;
        let mut first = true;

        loop {
            let chunk_len = remaining.len().min(TXMAX);
            let mut chunk = remaining[..chunk_len].to_vec();
            if !first {
                chunk[0] = 0xAF;
            }
            remaining = &remaining[chunk_len..];
            let more_to_send = !remaining.is_empty();

            let reply = self.exchange(&chunk)?;

            if more_to_send {
                if reply.len() != 1 || reply[0] != 0xAF {
                    self.deauthenticate();
                    fail!(DfErrorKind::TxNoSpace, "card did not ack continuation frame");
                }
                first = false;
                continue;
            }

            return self.collect_reply(cmd, reply);
        }
    }

    /// Concatenate `0xAF`-continued receive fragments, dropping the
    /// intermediate status bytes and keeping the final status at index 0.
    fn collect_reply(&mut self, cmd: u8, mut collected: Vec<u8>) -> Result<Vec<u8>, DfError> {
        loop {
            if collected.is_empty() {
                self.deauthenticate();
                fail!(DfErrorKind::CardGone, "empty reply from card");
            }

            if collected[0] != 0xAF || AF_IS_HANDSHAKE_STATUS.contains(&cmd) {
                return Ok(collected);
            }

            let probe = self.exchange(&[0xAF])?;
            if probe.is_empty() {
                self.deauthenticate();
                fail!(DfErrorKind::CardGone, "card gone mid-continuation");
            }
            collected.extend_from_slice(&probe[1..]);
            collected[0] = probe[0];
        }
    }

    fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>, DfError> {
        self.transport.exchange(tx, RX_CAP).map_err(|err| {
            self.deauthenticate();
            DfError::from(err)
        })
    }

    fn post_process(&mut self, reply: Vec<u8>, rx_mode: RxMode) -> Result<Vec<u8>, DfError> {
        if reply.is_empty() {
            self.deauthenticate();
            fail!(DfErrorKind::CardGone, "empty reply from card");
        }

        let status = reply[0];
        if status != 0x00 && status != 0xAF {
            self.deauthenticate();
            return Err(DfErrorKind::from_status_byte(status).into());
        }

        if self.block_len() == 0 {
            if let RxMode::Encrypted { .. } = rx_mode {
                fail!(
                    DfErrorKind::NotAuthenticated,
                    "encrypted reply requested on an unauthenticated session"
                );
            }
            return Ok(reply);
        }

        match rx_mode {
            RxMode::Plain => self.verify_plain_reply(reply),
            RxMode::Encrypted { expected_plain } => self.decrypt_reply(status, reply, expected_plain),
        }
    }

    fn verify_plain_reply(&mut self, mut reply: Vec<u8>) -> Result<Vec<u8>, DfError> {
        if reply.len() <= 1 {
            return Ok(reply);
        }
        if reply.len() < 9 {
            self.deauthenticate();
            fail!(DfErrorKind::BadReplyLength, "reply too short to carry a CMAC tag");
        }

        let split = reply.len() - 8;
        let tag = reply[split..].to_vec();
        reply.truncate(split);

        self.cmac_update(&reply);
        let expected = self.cmac_iv;
        if tag[0] != expected[0] || tag[1..8] != expected[1..8] {
            self.deauthenticate();
            fail!(DfErrorKind::RxCmacFail, "reply CMAC mismatch");
        }

        Ok(reply)
    }

    fn decrypt_reply(
        &mut self,
        status: u8,
        reply: Vec<u8>,
        expected_plain: u8,
    ) -> Result<Vec<u8>, DfError> {
        let block_len = self.block_len();
        let expected_plain = expected_plain as usize;
        let min_len = expected_plain + 4;
        let ciphertext_len = ((min_len + block_len - 1) / block_len) * block_len;
        let expected_total = 1 + ciphertext_len;

        if reply.len() != expected_total {
            self.deauthenticate();
            fail!(
                DfErrorKind::BadEncryptedLength,
                "expected {} byte encrypted reply, got {}",
                expected_total,
                reply.len()
            );
        }

        let cipher = self.cipher.expect("block_len != 0 implies a cipher is set");
        let key = self.sk0[..block_len].to_vec();
        let mut iv = self.cmac_iv[..block_len].to_vec();
        let mut region = reply[1..].to_vec();
        crypto::cbc_decrypt(cipher, &key, &mut iv, &mut region)?;
        self.cmac_iv[..block_len].copy_from_slice(&iv);

        let data = region[..expected_plain].to_vec();
        let crc_bytes = &region[expected_plain..expected_plain + 4];
        let expected_crc = LittleEndian::read_u32(crc_bytes);

        let mut check_buf = data.clone();
        check_buf.push(status);
        let actual_crc = crypto::crc32_jam(&check_buf);

        if actual_crc != expected_crc {
            self.deauthenticate();
            fail!(DfErrorKind::RxCrcFail, "decrypted reply CRC mismatch");
        }

        let mut out = Vec::with_capacity(1 + expected_plain);
        out.push(status);
        out.extend_from_slice(&data);
        Ok(out)
    }
}
