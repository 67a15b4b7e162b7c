//! An in-memory DESFire card simulator implementing `CardTransport`.
//!
//! Mirrors the teacher corpus's `mockhsm`/`create_channel_pair` pattern of
//! running both sides of a secure-channel handshake in-process so the
//! session driver can be exercised without real hardware.

use desfire_aes::command::CommsMode;
use desfire_aes::crypto::{self, Cipher};
use desfire_aes::{CardTransport, TransportError};

/// One standard data file, enough to exercise plain, CMAC, and encrypted
/// read/write.
#[derive(Default, Clone)]
struct DataFile {
    contents: Vec<u8>,
}

/// Card-side secure channel state, independently re-derived from the same
/// handshake bytes the real card driver produces (not shared code with the
/// driver under test).
struct CardChannel {
    cipher: Cipher,
    /// Masked (0..15) key slot this channel authenticated against, used to
    /// pick `ChangeKey`'s single- vs dual-CRC wire shape.
    key_no: u8,
    sk0: Vec<u8>,
    sk1: Vec<u8>,
    sk2: Vec<u8>,
    cmac_iv: Vec<u8>,
}

/// Challenge state held between the first and second handshake frames.
struct PendingAuth {
    cipher: Cipher,
    key: Vec<u8>,
    key_no: u8,
    b: Vec<u8>,
    iv: Vec<u8>,
}

/// Minimal card simulator: a handful of AES key slots, a fixed UID, one
/// data file.
pub struct MockCard {
    keys: Vec<[u8; 16]>,
    uid: [u8; 7],
    selected_aid: [u8; 3],
    channel: Option<CardChannel>,
    pending: Option<PendingAuth>,
    file: DataFile,
    /// Comms mode `WriteData`/`ReadData` against file 0 are protected with;
    /// stands in for the file's configured access rights (normally set via
    /// `CreateFile`/`ChangeFileSettings`, which this mock doesn't model).
    file_comms: CommsMode,
}

impl MockCard {
    /// Create a card with the given 16-byte AES master key and UID.
    pub fn new(master_key: [u8; 16], uid: [u8; 7]) -> Self {
        MockCard {
            keys: vec![master_key],
            uid,
            selected_aid: [0, 0, 0],
            channel: None,
            pending: None,
            file: DataFile::default(),
            file_comms: CommsMode::empty(),
        }
    }

    /// Configure the comms mode file 0's reads/writes are protected with.
    pub fn with_file_comms(mut self, comms: CommsMode) -> Self {
        self.file_comms = comms;
        self
    }

    fn status(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![code];
        out.extend_from_slice(payload);
        out
    }

    fn handle_authenticate(&mut self, tx: &[u8]) -> Vec<u8> {
        let cmd = tx[0];
        let key_no = tx[1];

        let (cipher, key) = match cmd {
            0xAA => {
                let idx = key_no as usize;
                assert!(idx < self.keys.len(), "mock card has no key in slot {}", key_no);
                (Cipher::Aes128, self.keys[idx].to_vec())
            }
            // The legacy DES handshake only ever runs against the
            // factory-default zero key, matching `format`'s fixed `zero_des`.
            0x1A => (Cipher::Des, vec![0u8; 8]),
            other => panic!("mock card does not implement authenticate variant 0x{:02x}", other),
        };

        let block_len = cipher.block_len();
        let b = crypto::random_bytes(block_len);
        let mut iv = vec![0u8; block_len];
        let mut b_enc = b.clone();
        crypto::cbc_encrypt(cipher, &key, &mut iv, &mut b_enc).unwrap();

        self.pending = Some(PendingAuth {
            cipher,
            key,
            key_no: key_no & 0x0F,
            b,
            iv,
        });

        Self::status(0xAF, &b_enc)
    }

    fn handle_continuation(&mut self, tx: &[u8]) -> Vec<u8> {
        let pending = self.pending.take().expect("continuation without pending challenge");
        let PendingAuth {
            cipher,
            key,
            key_no,
            b,
            mut iv,
        } = pending;
        let block_len = cipher.block_len();

        let mut plaintext = tx[1..].to_vec();
        crypto::cbc_decrypt(cipher, &key, &mut iv, &mut plaintext).unwrap();

        let a = plaintext[..block_len].to_vec();
        let rot_b_received = plaintext[block_len..].to_vec();
        if rot_b_received != rotl1(&b) {
            // Wrong key: the host's echo of our challenge won't match.
            // Report it the way a real card would, as an auth-error status
            // byte, rather than panicking the mock.
            return Self::status(0xAE, &[]);
        }

        let mut a_prime = rotl1(&a);
        crypto::cbc_encrypt(cipher, &key, &mut iv, &mut a_prime).unwrap();

        let mut sk0 = vec![0u8; 16];
        sk0[0..4].copy_from_slice(&a[0..4]);
        sk0[4..8].copy_from_slice(&b[0..4]);
        if block_len == 16 {
            sk0[8..12].copy_from_slice(&a[12..16]);
            sk0[12..16].copy_from_slice(&b[12..16]);
        }

        let (sk1, sk2) = if block_len == 16 {
            derive_subkeys(cipher, &sk0)
        } else {
            (vec![0u8; 16], vec![0u8; 16])
        };

        self.channel = Some(CardChannel {
            cipher,
            key_no,
            sk0,
            sk1,
            sk2,
            cmac_iv: vec![0u8; 16],
        });

        Self::status(0x00, &a_prime)
    }

    fn handle_select_application(&mut self, tx: &[u8]) -> Vec<u8> {
        self.selected_aid = [tx[1], tx[2], tx[3]];
        self.channel = None;
        Self::status(0x00, &[])
    }

    fn handle_get_uid(&mut self) -> Vec<u8> {
        let channel = self.channel.as_mut().expect("GetUID requires an authenticated channel");
        let block_len = channel.cipher.block_len();

        let mut plain = self.uid.to_vec();
        plain.push(0x00); // status appended at the end for CRC purposes
        let crc = crypto::crc32_jam(&plain);
        plain.pop();
        plain.extend_from_slice(&crc.to_le_bytes());
        while plain.len() % block_len != 0 {
            plain.push(0);
        }

        crypto::cbc_encrypt(channel.cipher, &channel.sk0, &mut channel.cmac_iv, &mut plain).unwrap();
        Self::status(0x00, &plain)
    }

    fn handle_write_data(&mut self, tx: &[u8]) -> Vec<u8> {
        let offset = u32::from(tx[2]) | (u32::from(tx[3]) << 8) | (u32::from(tx[4]) << 16);
        let len = u32::from(tx[5]) | (u32::from(tx[6]) << 8) | (u32::from(tx[7]) << 16);
        let header_len = 7; // file_no + offset(3) + len(3)
        let leading = 1 + header_len; // cmd + header

        let data = if self.file_comms.contains(CommsMode::ENC) {
            let channel = self.channel.as_mut().expect("encrypted WriteData requires a channel");
            let mut region = tx[leading..].to_vec();
            crypto::cbc_decrypt(channel.cipher, &channel.sk0, &mut channel.cmac_iv, &mut region).unwrap();

            let plain = region[..len as usize].to_vec();
            let expected_crc = u32::from_le_bytes(region[len as usize..len as usize + 4].try_into().unwrap());
            let mut check = tx[..leading].to_vec();
            check.extend_from_slice(&plain);
            assert_eq!(
                crypto::crc32_jam(&check),
                expected_crc,
                "WriteData decrypted CRC mismatch"
            );
            plain
        } else if self.file_comms.contains(CommsMode::CMAC) {
            let channel = self.channel.as_mut().expect("CMAC WriteData requires a channel");
            let tagged_len = tx.len() - 8;
            let (msg, tag) = tx.split_at(tagged_len);
            cmac_update(channel, msg);
            let expected = channel.cmac_iv;
            assert_eq!(tag[0], expected[0], "WriteData CMAC mismatch");
            assert_eq!(&tag[1..8], &expected[1..8], "WriteData CMAC mismatch");
            msg[leading..].to_vec()
        } else {
            tx[leading..].to_vec()
        };

        let end = offset as usize + data.len();
        if self.file.contents.len() < end {
            self.file.contents.resize(end, 0);
        }
        self.file.contents[offset as usize..end].copy_from_slice(&data);
        Self::status(0x00, &[])
    }

    /// Plain replies that carry data are CMAC-tagged whenever a secure
    /// channel is active, mirroring the host driver's `verify_plain_reply`
    /// (which checks for a trailing tag on any reply longer than one byte).
    /// An encrypted reply instead follows `GetUID`'s CRC+CBC envelope.
    fn handle_read_data(&mut self, tx: &[u8]) -> Vec<u8> {
        let offset = u32::from(tx[2]) | (u32::from(tx[3]) << 8) | (u32::from(tx[4]) << 16);
        let len = u32::from(tx[5]) | (u32::from(tx[6]) << 8) | (u32::from(tx[7]) << 16);
        let end = offset as usize + len as usize;
        let data = self.file.contents[offset as usize..end].to_vec();

        if self.file_comms.contains(CommsMode::ENC) {
            let channel = self.channel.as_mut().expect("encrypted ReadData requires a channel");
            let block_len = channel.cipher.block_len();

            let mut plain = data;
            plain.push(0x00);
            let crc = crypto::crc32_jam(&plain);
            plain.pop();
            plain.extend_from_slice(&crc.to_le_bytes());
            while plain.len() % block_len != 0 {
                plain.push(0);
            }

            crypto::cbc_encrypt(channel.cipher, &channel.sk0, &mut channel.cmac_iv, &mut plain).unwrap();
            return Self::status(0x00, &plain);
        }

        let mut reply = Self::status(0x00, &data);
        if let Some(channel) = self.channel.as_mut() {
            cmac_update(channel, &reply);
            reply.extend_from_slice(&channel.cmac_iv[..8]);
        }
        reply
    }

    /// `ChangeKey`'s dual-CRC wire format: CRC1 is always over the plain new
    /// key, taken before the XOR-with-old-key step; CRC2 (over the plain new
    /// key alone) and the XOR only apply when `key_no`'s masked slot differs
    /// from the slot this channel authenticated against.
    fn handle_change_key(&mut self, tx: &[u8]) -> Vec<u8> {
        let key_no_wire = tx[1];
        let masked = key_no_wire & 0x0F;

        let (cipher, sk0, auth_key_no) = {
            let channel = self.channel.as_ref().expect("ChangeKey requires an authenticated channel");
            (channel.cipher, channel.sk0.clone(), channel.key_no)
        };
        let changing_auth_key = masked == auth_key_no;

        let channel = self.channel.as_mut().unwrap();
        let mut region = tx[2..].to_vec();
        crypto::cbc_decrypt(cipher, &sk0, &mut channel.cmac_iv, &mut region).unwrap();

        let content: [u8; 16] = region[0..16].try_into().unwrap();
        let version = region[16];
        let crc1 = u32::from_le_bytes(region[17..21].try_into().unwrap());

        let new_key = if changing_auth_key {
            content
        } else {
            let old = self.keys.get(masked as usize).copied().unwrap_or([0u8; 16]);
            let mut out = [0u8; 16];
            for i in 0..16 {
                out[i] = content[i] ^ old[i];
            }
            out
        };

        let mut check_buf = vec![0xC4u8, key_no_wire];
        check_buf.extend_from_slice(&new_key);
        check_buf.push(version);
        assert_eq!(crypto::crc32_jam(&check_buf), crc1, "ChangeKey CRC1 mismatch");

        if !changing_auth_key {
            let crc2 = u32::from_le_bytes(region[21..25].try_into().unwrap());
            assert_eq!(crypto::crc32_jam(&new_key), crc2, "ChangeKey CRC2 mismatch");
        }

        let idx = masked as usize;
        if idx >= self.keys.len() {
            self.keys.resize(idx + 1, [0u8; 16]);
        }
        self.keys[idx] = new_key;

        // Changing the key just authenticated against invalidates this
        // channel's key material; changing some other slot leaves it valid.
        if changing_auth_key {
            self.channel = None;
        }
        Self::status(0x00, &[])
    }

    fn handle_format(&mut self) -> Vec<u8> {
        self.channel.as_ref().expect("Format requires an authenticated channel");
        self.file = DataFile::default();
        self.selected_aid = [0, 0, 0];
        self.channel = None;
        Self::status(0x00, &[])
    }
}

impl CardTransport for MockCard {
    fn exchange(&mut self, tx: &[u8], _rx_cap: usize) -> Result<Vec<u8>, TransportError> {
        let reply = match tx[0] {
            0xAA | 0x1A => self.handle_authenticate(tx),
            0xAF => self.handle_continuation(tx),
            0x5A => self.handle_select_application(tx),
            0x51 => self.handle_get_uid(),
            0x3D => self.handle_write_data(tx),
            0xBD => self.handle_read_data(tx),
            0xC4 => self.handle_change_key(tx),
            0xFC => self.handle_format(),
            other => panic!("mock card does not implement command 0x{:02x}", other),
        };
        Ok(reply)
    }
}

/// Chain `data` into `channel`'s running CMAC/CBC state, independently
/// reimplementing the host driver's chained-CMAC algorithm (NIST SP 800-38B
/// subkeys over a stateful IV) rather than sharing its crate-private code.
fn cmac_update(channel: &mut CardChannel, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let block_len = channel.cipher.block_len();

    let mut blocks = data.to_vec();
    let subkey = if blocks.len() % block_len == 0 {
        channel.sk1.clone()
    } else {
        blocks.push(0x80);
        while blocks.len() % block_len != 0 {
            blocks.push(0x00);
        }
        channel.sk2.clone()
    };

    let last = blocks.len() - block_len;
    for i in 0..block_len {
        blocks[last + i] ^= subkey[i];
    }

    crypto::cbc_encrypt(channel.cipher, &channel.sk0, &mut channel.cmac_iv, &mut blocks).unwrap();
}

fn rotl1(block: &[u8]) -> Vec<u8> {
    let mut out = block.to_vec();
    out.rotate_left(1);
    out
}

fn derive_subkeys(cipher: Cipher, sk0: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let block_len = cipher.block_len();
    let mut l = vec![0u8; block_len];
    let mut iv = vec![0u8; block_len];
    crypto::cbc_encrypt(cipher, sk0, &mut iv, &mut l).unwrap();

    let r = cipher.subkey_r();
    let sk1 = shift_left_1(&l, r);
    let sk2 = shift_left_1(&sk1, r);
    (sk1, sk2)
}

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
