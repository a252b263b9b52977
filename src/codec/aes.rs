//! WinZip AES (AE-1/AE-2) decryption.
//!
//! An AES encrypted payload starts with a salt, followed by a 2-byte
//! password verification value, the encrypted data, and lastly a
//! 10-byte authentication code computed as HMAC-SHA1 over the
//! ciphertext.
//!
//! The cipher is a slightly non-standard AES-CTR variant: no nonce, and
//! a little-endian block counter starting at 1, where NIST CTR is
//! big-endian.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Result, ZipError};

/// Salt length for AES-256.
const SALT_LENGTH: usize = 16;
/// The length of the password verification value in bytes.
const PWD_VERIFY_LENGTH: usize = 2;
/// The length of the authentication code in bytes.
const AUTH_CODE_LENGTH: usize = 10;
/// The number of iterations used with PBKDF2.
const ITERATION_COUNT: u32 = 1000;
/// AES-256 key length in bytes.
const KEY_LENGTH: usize = 32;
/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

const HEADER_LENGTH: usize = SALT_LENGTH + PWD_VERIFY_LENGTH;

/// Streaming AES-256 decrypter for one entry payload.
///
/// Buffers the leading salt and verifier until key derivation can run,
/// then decrypts in CTR mode while holding back the trailing
/// authentication code, which is verified in [`finish`](Self::finish).
pub(crate) struct AesDecrypter {
    password: String,
    header: Vec<u8>,
    cipher: Option<Aes256>,
    hmac: Option<Hmac<Sha1>>,
    counter: u128,
    keystream: [u8; BLOCK_SIZE],
    keystream_pos: usize,
    tail: Vec<u8>,
}

impl AesDecrypter {
    pub fn new(password: String) -> Self {
        Self {
            password,
            header: Vec::with_capacity(HEADER_LENGTH),
            cipher: None,
            hmac: None,
            counter: 1,
            keystream: [0u8; BLOCK_SIZE],
            keystream_pos: BLOCK_SIZE,
            tail: Vec::new(),
        }
    }

    /// Derive the decryption and authentication keys from the password
    /// and the salt, and check the 2-byte verification value.
    fn derive_keys(&mut self) -> Result<()> {
        let salt = &self.header[..SALT_LENGTH];
        let verifier = &self.header[SALT_LENGTH..];

        // PBKDF2 with HMAC-SHA1 yields decryption key, HMAC key and the
        // 2-byte verification value, in that order.
        let mut derived = [0u8; 2 * KEY_LENGTH + PWD_VERIFY_LENGTH];
        pbkdf2::pbkdf2_hmac::<Sha1>(
            self.password.as_bytes(),
            salt,
            ITERATION_COUNT,
            &mut derived,
        );

        if !constant_time_eq(&derived[2 * KEY_LENGTH..], verifier) {
            return Err(ZipError::InvalidPassword);
        }

        self.cipher = Some(Aes256::new(GenericArray::from_slice(
            &derived[..KEY_LENGTH],
        )));
        self.hmac = Some(
            <Hmac<Sha1> as Mac>::new_from_slice(&derived[KEY_LENGTH..2 * KEY_LENGTH])
                .expect("hmac accepts any key length"),
        );
        Ok(())
    }

    fn keystream_byte(&mut self) -> u8 {
        if self.keystream_pos == BLOCK_SIZE {
            // The counter is the whole block, little-endian.
            let mut block = GenericArray::clone_from_slice(&self.counter.to_le_bytes());
            self.cipher
                .as_ref()
                .expect("keys derived before decryption")
                .encrypt_block(&mut block);
            self.keystream.copy_from_slice(&block);
            self.counter += 1;
            self.keystream_pos = 0;
        }
        let b = self.keystream[self.keystream_pos];
        self.keystream_pos += 1;
        b
    }

    /// Decrypt the next chunk of the raw payload.
    ///
    /// # Errors
    ///
    /// `InvalidPassword` as soon as the verification value disagrees
    /// with the derived key material.
    pub fn feed(&mut self, mut input: &[u8]) -> Result<Vec<u8>> {
        if self.header.len() < HEADER_LENGTH {
            let need = HEADER_LENGTH - self.header.len();
            let take = need.min(input.len());
            self.header.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.header.len() == HEADER_LENGTH {
                self.derive_keys()?;
            }
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        // Everything but the final AUTH_CODE_LENGTH bytes is ciphertext;
        // the split point is only known once the input ends, so that
        // many bytes are always held back.
        self.tail.extend_from_slice(input);
        if self.tail.len() <= AUTH_CODE_LENGTH {
            return Ok(Vec::new());
        }

        let take = self.tail.len() - AUTH_CODE_LENGTH;
        let mut chunk: Vec<u8> = self.tail.drain(..take).collect();
        self.hmac
            .as_mut()
            .expect("keys derived before decryption")
            .update(&chunk);
        for b in chunk.iter_mut() {
            *b ^= self.keystream_byte();
        }
        Ok(chunk)
    }

    /// Verify the trailing authentication code.
    ///
    /// # Errors
    ///
    /// `InvalidPassword` when authentication fails; `BadFormat` when the
    /// payload was too short to carry the AES framing.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if self.header.len() < HEADER_LENGTH || self.tail.len() != AUTH_CODE_LENGTH {
            return Err(ZipError::BadFormat("aes payload truncated"));
        }
        let tag = self
            .hmac
            .take()
            .expect("keys derived before decryption")
            .finalize()
            .into_bytes();
        if !constant_time_eq(&tag[..AUTH_CODE_LENGTH], &self.tail) {
            return Err(ZipError::InvalidPassword);
        }
        Ok(Vec::new())
    }
}
