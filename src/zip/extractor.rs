//! High-level archive reading API.
//!
//! [`ZipReader`] ties the pieces together: it lists entries through the
//! directory parser and extracts entry data by validating the local
//! file header, building a codec, and driving the streaming pipeline
//! into a caller-supplied sink.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamzip::{FileSource, ZipReader};
//!
//! # async fn example() -> streamzip::Result<()> {
//! let source = Arc::new(FileSource::open(std::path::Path::new("archive.zip"))?);
//! let reader = ZipReader::new(source);
//!
//! for entry in reader.list_entries().await? {
//!     if !entry.directory {
//!         let data = reader.read_entry_to_vec(&entry).await?;
//!         println!("{}: {} bytes", entry.filename, data.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::{CodecConfig, CodecFactory, DefaultCodecFactory, EncryptionSpec};
use crate::error::{Result, ZipError};
use crate::io::{FileSink, RandomSource, Sink, VecSink};
use crate::options::{ListOptions, ReadOptions, ReaderOptions, DEFAULT_CHUNK_SIZE};
use crate::zip::extra::ExtraFields;
use crate::zip::parser::ZipParser;
use crate::zip::pipeline;
use crate::zip::structures::{
    CompressionMethod, GeneralPurposeFlags, ZipFileEntry, COMPRESSION_METHOD_AES, LFH_SIGNATURE,
    LFH_SIZE,
};

/// The transient view of a local file header, cross-validated against
/// the central directory entry before extraction.
struct LocalHeader {
    bit_flag: GeneralPurposeFlags,
    compression_method: u16,
    dos_time: u16,
    filename_length: u16,
    extra_field_length: u16,
    extra_fields: ExtraFields,
}

/// High-level ZIP archive reader.
///
/// Generic over the source type, so local files
/// ([`FileSource`](crate::FileSource)), in-memory buffers
/// ([`MemorySource`](crate::MemorySource)) and remote archives
/// ([`HttpSource`](crate::HttpSource)) all share one code path.
///
/// ## Supported payloads
///
/// - `STORED` (0) and `DEFLATE` (8) compression
/// - WinZip AES-256 (AE-1/AE-2) and legacy PKWARE encryption
/// - ZIP64 archives and entries
///
/// The reader is read-only and cheap to share; entries may be extracted
/// concurrently with distinct sinks.
pub struct ZipReader<R: RandomSource> {
    /// The underlying parser for the archive's directory structures
    parser: ZipParser<R>,
    options: ReaderOptions,
}

impl<R: RandomSource> ZipReader<R> {
    /// Create a reader with default options.
    pub fn new(source: Arc<R>) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    /// Create a reader with reader-level options (fallback charsets,
    /// password, CRC policy, chunk size, codec factory).
    pub fn with_options(source: Arc<R>, options: ReaderOptions) -> Self {
        Self {
            parser: ZipParser::new(source),
            options,
        }
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &Arc<R> {
        self.parser.source()
    }

    /// List all entries in the archive, in central-directory order.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is invalid or cannot be read.
    pub async fn list_entries(&self) -> Result<Vec<ZipFileEntry>> {
        self.list_entries_with(&ListOptions::default()).await
    }

    /// List all entries, overriding the fallback charsets for this call.
    pub async fn list_entries_with(&self, opts: &ListOptions) -> Result<Vec<ZipFileEntry>> {
        let (filename_charset, comment_charset) = self.options.decode_charsets(opts);
        self.parser
            .list_entries(filename_charset, comment_charset)
            .await
    }

    /// Extract one entry, streaming its decompressed bytes into `sink`.
    ///
    /// The compressed payload is read in bounded chunks, decrypted and
    /// inflated by the codec, and written to the sink in order; the
    /// sink's finalization result is returned.
    ///
    /// # Arguments
    ///
    /// * `entry` - An entry from [`list_entries`](Self::list_entries)
    /// * `sink` - Receiver for the decompressed bytes
    /// * `opts` - Per-call overrides (password, CRC check, progress)
    ///
    /// # Errors
    ///
    /// - `LocalHeaderNotFound` if the entry offset does not hold a local
    ///   file header
    /// - `Encrypted` if a password is required but missing
    /// - `UnsupportedEncryption` / `UnsupportedCompression` for payloads
    ///   outside the supported set
    /// - `CrcMismatch` / `InvalidPassword` surfaced from the codec
    pub async fn read_entry<S: Sink>(
        &self,
        entry: &ZipFileEntry,
        sink: S,
        opts: ReadOptions,
    ) -> Result<S::Output> {
        let source = self.parser.source();
        source.init().await?;

        let local = self.read_local_header(entry).await?;

        // The AES descriptor may sit in either header; they must not
        // disagree about the wrapped method.
        let aes = entry.extra_fields.aes.or(local.extra_fields.aes);
        if let Some(aes) = aes {
            if aes.strength != 3 {
                return Err(ZipError::UnsupportedEncryption {
                    strength: aes.strength,
                });
            }
            if entry.raw_compression_method != COMPRESSION_METHOD_AES {
                return Err(ZipError::UnsupportedCompression {
                    method: entry.raw_compression_method,
                });
            }
        }

        let local_effective = match local.extra_fields.aes {
            Some(aes) => aes.compression_method,
            None => local.compression_method,
        };
        if local_effective != entry.compression_method.as_u16() {
            return Err(ZipError::BadFormat(
                "local header disagrees with central directory",
            ));
        }

        if !matches!(
            entry.compression_method,
            CompressionMethod::Stored | CompressionMethod::Deflate
        ) {
            return Err(ZipError::UnsupportedCompression {
                method: entry.compression_method.as_u16(),
            });
        }

        // Both records must carry the encryption bit for the payload to
        // actually be encrypted.
        let encrypted = entry.bit_flag.encrypted && local.bit_flag.encrypted;
        let password = opts.password.clone().or_else(|| self.options.password.clone());
        if encrypted && password.is_none() {
            return Err(ZipError::Encrypted);
        }

        let data_offset = entry.offset
            + LFH_SIZE as u64
            + local.filename_length as u64
            + local.extra_field_length as u64;
        if data_offset
            .checked_add(entry.compressed_size)
            .map_or(true, |end| end > source.size())
        {
            return Err(ZipError::BadFormat("entry data outside the archive"));
        }

        let encryption = if !encrypted {
            EncryptionSpec::None
        } else if aes.is_some() {
            EncryptionSpec::Aes
        } else {
            // The preamble check byte is the CRC high byte, unless the
            // sizes live in a data descriptor, then the DOS time high
            // byte stands in.
            let check_byte = if local.bit_flag.data_descriptor {
                (local.dos_time >> 8) as u8
            } else {
                (entry.crc32 >> 24) as u8
            };
            EncryptionSpec::ZipCrypto { check_byte }
        };

        // AE-2 zeroes the CRC field, so there is nothing to verify.
        let mut signed = opts.check_crc.or(self.options.check_crc).unwrap_or(false);
        if aes.map_or(false, |a| a.vendor_version == 2) {
            signed = false;
        }

        let config = CodecConfig {
            password,
            signed,
            signature: entry.crc32,
            compressed: entry.compression_method == CompressionMethod::Deflate,
            encryption,
        };
        let codec = match &self.options.codec_factory {
            Some(factory) => factory.create_codec(config)?,
            None => DefaultCodecFactory.create_codec(config)?,
        };

        let chunk_size = opts
            .chunk_size
            .or(self.options.chunk_size)
            .unwrap_or(DEFAULT_CHUNK_SIZE)
            .max(1);
        debug!(
            "extracting {:?}: {} compressed bytes at {:#x}",
            entry.filename, entry.compressed_size, data_offset
        );

        pipeline::run(
            codec,
            source.as_ref(),
            sink,
            data_offset,
            entry.compressed_size,
            chunk_size,
            opts.on_progress.as_deref(),
        )
        .await
    }

    /// Extract one entry into memory.
    ///
    /// Convenience wrapper around [`read_entry`](Self::read_entry) with
    /// a [`VecSink`]. For large entries prefer a streaming sink.
    pub async fn read_entry_to_vec(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        self.read_entry(entry, VecSink::new(), ReadOptions::default())
            .await
    }

    /// Extract one entry to a file, creating parent directories as
    /// needed. Returns the written path.
    pub async fn read_entry_to_file(
        &self,
        entry: &ZipFileEntry,
        path: &Path,
    ) -> Result<PathBuf> {
        self.read_entry(entry, FileSink::new(path), ReadOptions::default())
            .await
    }

    /// Read and parse the local file header backing `entry`.
    async fn read_local_header(&self, entry: &ZipFileEntry) -> Result<LocalHeader> {
        let source = self.parser.source();

        let mut fixed = vec![0u8; LFH_SIZE];
        source.read_fully(entry.offset, &mut fixed).await?;
        if &fixed[0..4] != LFH_SIGNATURE {
            return Err(ZipError::LocalHeaderNotFound);
        }

        let raw_flags = LittleEndian::read_u16(&fixed[6..]);
        let compression_method = LittleEndian::read_u16(&fixed[8..]);
        let dos_time = LittleEndian::read_u16(&fixed[10..]);
        let filename_length = LittleEndian::read_u16(&fixed[26..]);
        let extra_field_length = LittleEndian::read_u16(&fixed[28..]);

        // The local extra field can differ from the central one (AES
        // descriptors usually live in both); parse it separately.
        let mut var = vec![0u8; filename_length as usize + extra_field_length as usize];
        source
            .read_fully(entry.offset + LFH_SIZE as u64, &mut var)
            .await?;
        let extra_fields = ExtraFields::parse(&var[filename_length as usize..]);

        Ok(LocalHeader {
            bit_flag: GeneralPurposeFlags::from_raw(raw_flags, compression_method),
            compression_method,
            dos_time,
            filename_length,
            extra_field_length,
            extra_fields,
        })
    }
}
