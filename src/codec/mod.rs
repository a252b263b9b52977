//! Per-entry transform chain: decrypt, inflate, checksum.
//!
//! The extractor does not decompress or decrypt by itself; it builds a
//! [`Codec`] through a [`CodecFactory`] and pushes compressed chunks
//! through it. The default factory assembles the built-in chain
//! (ZipCrypto/AES-256 decryption, STORE/DEFLATE inflation, CRC-32
//! accounting); callers can substitute their own factory, e.g. to run
//! the heavy lifting on a worker pool.

mod aes;
mod inflate;
mod zipcrypto;

use async_trait::async_trait;

use crate::error::{Result, ZipError};

use self::aes::AesDecrypter;
use self::inflate::Inflater;
use self::zipcrypto::ZipCryptoDecrypter;

/// How an entry's payload is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionSpec {
    None,
    /// WinZip AES; only strength 3 (AES-256) reaches a codec.
    Aes,
    /// Legacy PKWARE stream cipher. The check byte is the preamble's
    /// last plaintext byte: the CRC high byte, or the DOS time high
    /// byte when the entry uses a data descriptor.
    ZipCrypto { check_byte: u8 },
}

/// Configuration handed to a [`CodecFactory`] for one extraction.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Password for encrypted entries.
    pub password: Option<String>,
    /// Verify the plaintext CRC-32 at flush.
    pub signed: bool,
    /// Expected CRC-32 of the plaintext.
    pub signature: u32,
    /// False for STORE entries, true for DEFLATE.
    pub compressed: bool,
    pub encryption: EncryptionSpec,
}

/// The trailing output of a codec.
#[derive(Debug)]
pub struct CodecFlush {
    /// Any plaintext still buffered when the input ended.
    pub data: Vec<u8>,
    /// CRC-32 of all plaintext produced.
    pub crc32: u32,
}

/// A streaming transform from compressed (possibly encrypted) chunks to
/// plaintext chunks.
///
/// One codec instance serves exactly one extraction. Calls arrive in
/// order: `init`, then `append` once per input chunk, then `flush`.
#[async_trait]
pub trait Codec: Send {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Transform the next input chunk. The returned plaintext may be
    /// empty while the codec buffers.
    async fn append(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Signal end of input, verify authentication and checksum, and
    /// return any trailing plaintext.
    ///
    /// # Errors
    ///
    /// `CrcMismatch` when verification was requested and failed;
    /// `InvalidPassword` on AES authenticity failure.
    async fn flush(&mut self) -> Result<CodecFlush>;
}

/// Builds one [`Codec`] per extraction.
pub trait CodecFactory: Send + Sync {
    fn create_codec(&self, config: CodecConfig) -> Result<Box<dyn Codec>>;
}

/// The built-in factory: ZipCrypto/AES-256 decryption, raw DEFLATE via
/// flate2, CRC-32 via crc32fast.
#[derive(Default)]
pub struct DefaultCodecFactory;

impl CodecFactory for DefaultCodecFactory {
    fn create_codec(&self, config: CodecConfig) -> Result<Box<dyn Codec>> {
        Ok(Box::new(EntryCodec::new(config)?))
    }
}

enum Decrypter {
    Aes(AesDecrypter),
    ZipCrypto(ZipCryptoDecrypter),
}

impl Decrypter {
    fn feed(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Decrypter::Aes(d) => d.feed(input),
            Decrypter::ZipCrypto(d) => d.feed(input),
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        match self {
            Decrypter::Aes(d) => d.finish(),
            Decrypter::ZipCrypto(d) => d.finish(),
        }
    }
}

/// The default transform chain.
struct EntryCodec {
    decrypter: Option<Decrypter>,
    inflater: Inflater,
    hasher: crc32fast::Hasher,
    signed: bool,
    expected: u32,
}

impl EntryCodec {
    fn new(config: CodecConfig) -> Result<Self> {
        let decrypter = match config.encryption {
            EncryptionSpec::None => None,
            EncryptionSpec::Aes => {
                let password = config.password.ok_or(ZipError::Encrypted)?;
                Some(Decrypter::Aes(AesDecrypter::new(password)))
            }
            EncryptionSpec::ZipCrypto { check_byte } => {
                let password = config.password.ok_or(ZipError::Encrypted)?;
                Some(Decrypter::ZipCrypto(ZipCryptoDecrypter::new(
                    &password, check_byte,
                )))
            }
        };

        Ok(Self {
            decrypter,
            inflater: Inflater::new(config.compressed),
            hasher: crc32fast::Hasher::new(),
            signed: config.signed,
            expected: config.signature,
        })
    }
}

#[async_trait]
impl Codec for EntryCodec {
    async fn append(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let out = match &mut self.decrypter {
            Some(d) => {
                let plaintext = d.feed(input)?;
                self.inflater.feed(&plaintext)?
            }
            None => self.inflater.feed(input)?,
        };
        self.hasher.update(&out);
        Ok(out)
    }

    async fn flush(&mut self) -> Result<CodecFlush> {
        let mut data = Vec::new();
        if let Some(d) = &mut self.decrypter {
            let residue = d.finish()?;
            if !residue.is_empty() {
                data.extend_from_slice(&self.inflater.feed(&residue)?);
            }
        }
        data.extend_from_slice(&self.inflater.finish()?);
        self.hasher.update(&data);

        let crc32 = self.hasher.clone().finalize();
        if self.signed && crc32 != self.expected {
            return Err(ZipError::CrcMismatch {
                expected: self.expected,
                actual: crc32,
            });
        }

        Ok(CodecFlush { data, crc32 })
    }
}
