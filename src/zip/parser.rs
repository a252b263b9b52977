//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP structures, reading
//! from any source that implements the [`RandomSource`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the locator and ZIP64 EOCD for large-archive support
//! 3. Read the Central Directory to get metadata for all entries
//! 4. For extraction, read each entry's Local File Header and data
//!
//! This approach is efficient for remote sources, as only the archive
//! tail has to be fetched to list contents.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::sync::Arc;

use crate::error::{Result, ZipError};
use crate::io::RandomSource;
use crate::zip::charset::{decode_text, Charset};
use crate::zip::extra::ExtraFields;
use crate::zip::scanner::find_last_signature;
use crate::zip::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the search window when looking for an EOCD that is not
/// flush with the end of the archive.
const MAX_COMMENT_SIZE: u64 = 65535;

/// MS-DOS directory bit inside the external file attributes.
const EXTERNAL_ATTR_DIRECTORY: u32 = 0x10;

/// Low-level ZIP directory parser.
///
/// Reads and parses the terminal structures of an archive into
/// [`ZipFileEntry`] records. Generic over the source type so local
/// files, in-memory buffers and remote archives all go through the same
/// code path.
///
/// Typically used through [`ZipReader`](super::ZipReader) rather than
/// directly.
pub struct ZipParser<R: RandomSource> {
    /// The underlying data source
    source: Arc<R>,
}

impl<R: RandomSource> ZipParser<R> {
    /// Create a new parser for the given source.
    pub fn new(source: Arc<R>) -> Self {
        Self { source }
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &Arc<R> {
        &self.source
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Handles both the flush-with-EOF case and archives whose EOCD is
    /// pushed back by a comment or trailing junk, by scanning backwards
    /// for the latest signature in the tail window.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, absolute offset of the EOCD).
    ///
    /// # Errors
    ///
    /// `BadFormat` if the source is smaller than an EOCD;
    /// `EocdNotFound` if no signature occurs in the window.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let found = find_last_signature(
            self.source.as_ref(),
            EndOfCentralDirectory::SIGNATURE,
            EndOfCentralDirectory::SIZE as u64,
            MAX_COMMENT_SIZE,
        )
        .await?;

        let (offset, tail) = found.ok_or(ZipError::EocdNotFound)?;
        debug!("located EOCD at {offset:#x}");
        let eocd = EndOfCentralDirectory::from_bytes(&tail)?;
        Ok((eocd, offset))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD carries sentinel counters. The
    /// 20-byte locator sits immediately before the EOCD and points at
    /// the ZIP64 EOCD; only the fixed 56 bytes of that record are read.
    ///
    /// # Arguments
    ///
    /// * `eocd_offset` - Absolute offset of the regular EOCD
    ///
    /// # Returns
    ///
    /// The parsed ZIP64 EOCD together with its absolute offset.
    ///
    /// # Errors
    ///
    /// `Zip64LocatorNotFound` / `Zip64EocdNotFound` when either record
    /// is missing or mis-signed.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<(Zip64Eocd, u64)> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EocdLocator::SIZE as u64)
            .ok_or(ZipError::Zip64LocatorNotFound)?;
        let mut locator_buf = vec![0u8; Zip64EocdLocator::SIZE];
        self.source
            .read_fully(locator_offset, &mut locator_buf)
            .await?;
        let locator = Zip64EocdLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64Eocd::MIN_SIZE];
        self.source
            .read_fully(locator.eocd64_offset, &mut eocd64_buf)
            .await?;
        let eocd64 = Zip64Eocd::from_bytes(&eocd64_buf)?;
        debug!("zip64 EOCD at {:#x}", locator.eocd64_offset);

        Ok((eocd64, locator.eocd64_offset))
    }

    /// List all entries of the archive, in central-directory order.
    ///
    /// Idempotent: the source is re-read on every call and entries are
    /// built fresh.
    ///
    /// # Arguments
    ///
    /// * `filename_charset` - Fallback charset for filenames
    /// * `comment_charset` - Fallback charset for comments
    ///
    /// # Errors
    ///
    /// Structural errors from the EOCD/ZIP64/central-directory walk; a
    /// `MissingZip64Field` if an entry carries a sentinel without the
    /// matching extra field.
    pub async fn list_entries(
        &self,
        filename_charset: Charset,
        comment_charset: Charset,
    ) -> Result<Vec<ZipFileEntry>> {
        self.source.init().await?;
        let (eocd, eocd_offset) = self.find_eocd().await?;

        // Central directory location, from the ZIP64 EOCD when any EOCD
        // counter is at its sentinel.
        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let (eocd64, eocd64_offset) = self.read_zip64_eocd(eocd_offset).await?;
            // The directory ends where the ZIP64 EOCD begins; derive the
            // start from that instead of trusting the offset field.
            let cd_size = eocd64.cd_size;
            let cd_offset = eocd64_offset
                .checked_sub(cd_size)
                .ok_or(ZipError::BadFormat("zip64 central directory size overrun"))?;
            (cd_offset, cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset
            .checked_add(cd_size)
            .map_or(true, |end| end > self.source.size())
        {
            return Err(ZipError::BadFormat(
                "central directory outside the archive",
            ));
        }

        // One bounded read for the whole directory; a single Range
        // request on remote sources.
        let mut cd_data = vec![0u8; cd_size as usize];
        self.source.read_fully(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries.min(1 << 16) as usize);
        let mut pos = 0usize;
        for _ in 0..total_entries {
            let (entry, consumed) =
                self.parse_central_header(&cd_data[pos..], filename_charset, comment_charset)?;
            entries.push(entry);
            pos += consumed;
        }
        debug!("parsed {} central directory entries", entries.len());

        Ok(entries)
    }

    /// Parse one Central Directory File Header at the start of `buf`.
    ///
    /// Returns the entry together with the number of bytes consumed.
    fn parse_central_header(
        &self,
        buf: &[u8],
        filename_charset: Charset,
        comment_charset: Charset,
    ) -> Result<(ZipFileEntry, usize)> {
        if buf.len() < CDFH_MIN_SIZE || &buf[0..4] != CDFH_SIGNATURE {
            return Err(ZipError::CentralDirectoryNotFound);
        }

        let version_made_by = LittleEndian::read_u16(&buf[4..]);
        let version_needed = LittleEndian::read_u16(&buf[6..]);
        let raw_flags = LittleEndian::read_u16(&buf[8..]);
        let raw_compression_method = LittleEndian::read_u16(&buf[10..]);
        let dos_time = LittleEndian::read_u16(&buf[12..]);
        let dos_date = LittleEndian::read_u16(&buf[14..]);
        let crc32 = LittleEndian::read_u32(&buf[16..]);
        let mut compressed_size = LittleEndian::read_u32(&buf[20..]) as u64;
        let mut uncompressed_size = LittleEndian::read_u32(&buf[24..]) as u64;
        let filename_length = LittleEndian::read_u16(&buf[28..]) as usize;
        let extra_field_length = LittleEndian::read_u16(&buf[30..]) as usize;
        let comment_length = LittleEndian::read_u16(&buf[32..]) as usize;
        let internal_attributes = LittleEndian::read_u16(&buf[36..]);
        let external_attributes = LittleEndian::read_u32(&buf[38..]);
        let mut offset = LittleEndian::read_u32(&buf[42..]) as u64;

        let consumed = CDFH_MIN_SIZE + filename_length + extra_field_length + comment_length;
        if buf.len() < consumed {
            return Err(ZipError::BadFormat("central directory truncated"));
        }

        // Immutable raw slices, owned by the entry.
        let name_start = CDFH_MIN_SIZE;
        let extra_start = name_start + filename_length;
        let comment_start = extra_start + extra_field_length;
        let raw_filename = buf[name_start..extra_start].to_vec();
        let raw_extra_field = buf[extra_start..comment_start].to_vec();
        let raw_comment = buf[comment_start..consumed].to_vec();

        let language_encoding = raw_flags & 0x0800 != 0;
        let mut filename = decode_text(&raw_filename, language_encoding, filename_charset);

        let mut extra_fields = ExtraFields::parse(&raw_extra_field);
        extra_fields.apply_zip64(&mut uncompressed_size, &mut compressed_size, &mut offset)?;
        if let Some(path) = extra_fields.apply_unicode_path(&raw_filename) {
            filename = path;
        }

        // An AES envelope hides the real method inside its descriptor.
        let effective_method = match extra_fields.aes {
            Some(aes) => aes.compression_method,
            None => raw_compression_method,
        };
        let bit_flag = GeneralPurposeFlags::from_raw(raw_flags, effective_method);

        let directory =
            external_attributes & EXTERNAL_ATTR_DIRECTORY != 0 || filename.ends_with('/');
        let comment = decode_text(&raw_comment, language_encoding, comment_charset);

        let entry = ZipFileEntry {
            offset,
            compressed_size,
            uncompressed_size,
            compression_method: CompressionMethod::from_u16(effective_method),
            raw_compression_method,
            crc32,
            last_modified: ZipDateTime::from_dos(dos_date, dos_time),
            filename,
            comment,
            raw_filename,
            raw_extra_field,
            raw_comment,
            bit_flag,
            directory,
            encrypted: bit_flag.encrypted,
            extra_fields,
            version_made_by,
            version_needed,
            internal_attributes,
            external_attributes,
        };

        Ok((entry, consumed))
    }
}
