use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use super::extra::ExtraFields;
use crate::error::{Result, ZipError};

/// Compression method sentinel used by AES-wrapped entries.
pub const COMPRESSION_METHOD_AES: u16 = 99;

/// ZIP compression methods supported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Decoded general purpose bit flag of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneralPurposeFlags {
    /// Bit 0: entry data is encrypted.
    pub encrypted: bool,
    /// Bits 1-2: compression option level.
    pub level: u8,
    /// Bit 3: sizes and CRC live in a trailing data descriptor.
    pub data_descriptor: bool,
    /// Set for DEFLATE entries without the enhanced-deflating bit.
    pub enhanced_deflating: bool,
    /// Bit 11: filename and comment are UTF-8.
    pub language_encoding: bool,
    /// The raw 16-bit field.
    pub raw: u16,
}

impl GeneralPurposeFlags {
    pub fn from_raw(raw: u16, compression_method: u16) -> Self {
        Self {
            encrypted: raw & 0x0001 != 0,
            level: ((raw >> 1) & 0x0003) as u8,
            data_descriptor: raw & 0x0008 != 0,
            enhanced_deflating: compression_method == 8 && raw & 0x0010 == 0,
            language_encoding: raw & 0x0800 != 0,
            raw,
        }
    }
}

/// Calendar date and time reconstructed from the MS-DOS fields.
///
/// The DOS encoding has two-second resolution and a 1980 base year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ZipDateTime {
    /// Decode the raw DOS date/time pair, or `None` if any component is
    /// out of range.
    pub fn from_dos(date: u16, time: u16) -> Option<Self> {
        let day = (date & 0x1F) as u8;
        let month = ((date >> 5) & 0x0F) as u8;
        let year = ((date >> 9) & 0x7F) + 1980;
        let second = ((time & 0x1F) * 2) as u8;
        let minute = ((time >> 5) & 0x3F) as u8;
        let hour = ((time >> 11) & 0x1F) as u8;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }

        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::EocdNotFound);
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any counter at its sentinel means the real values live in the
    /// ZIP64 EOCD.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFF_FFFF
            || self.cd_offset == 0xFFFF_FFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EocdLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::Zip64LocatorNotFound);
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
///
/// The record is variable-length; only the fixed portion is consumed
/// and the record's own size field is not honored.
pub struct Zip64Eocd {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::Zip64EocdNotFound);
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIZE: usize = 30;
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";

/// One entry of the central directory, normalized.
///
/// Sizes and the local header offset are promoted to 64 bits when the
/// directory carried ZIP64 sentinels. `compression_method` is the
/// effective method after unwrapping an AES envelope; the raw outer
/// method is kept alongside for validation during extraction.
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    /// Byte offset of the local file header inside the archive.
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Effective method after AES unwrap.
    pub compression_method: CompressionMethod,
    /// The method field as stored (99 for AES-wrapped entries).
    pub raw_compression_method: u16,
    /// Expected CRC-32 of the plaintext; 0 when not verified (AE-2).
    pub crc32: u32,
    /// Modification instant, `None` when the DOS fields are out of range.
    pub last_modified: Option<ZipDateTime>,
    pub filename: String,
    pub comment: String,
    /// Filename bytes as stored, kept for Unicode-Path CRC validation
    /// and caller introspection.
    pub raw_filename: Vec<u8>,
    pub raw_extra_field: Vec<u8>,
    pub raw_comment: Vec<u8>,
    pub bit_flag: GeneralPurposeFlags,
    /// Set from the external-attributes directory bit or a trailing `/`
    /// in the filename.
    pub directory: bool,
    /// Mirrors `bit_flag.encrypted`.
    pub encrypted: bool,
    pub extra_fields: ExtraFields,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_datetime_decodes() {
        // 2024-06-15 12:34:56
        let date = ((2024 - 1980) << 9) | (6 << 5) | 15;
        let time = (12 << 11) | (34 << 5) | (56 / 2);
        let dt = ZipDateTime::from_dos(date, time).unwrap();
        assert_eq!(
            (dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second),
            (2024, 6, 15, 12, 34, 56)
        );
    }

    #[test]
    fn dos_datetime_out_of_range_is_none() {
        // month 0 and month 13 are both invalid
        assert!(ZipDateTime::from_dos(0, 0).is_none());
        assert!(ZipDateTime::from_dos((13 << 5) | 1, 0).is_none());
    }

    #[test]
    fn bit_flags_decode() {
        let flags = GeneralPurposeFlags::from_raw(0x0809, 8);
        assert!(flags.encrypted);
        assert!(flags.data_descriptor);
        assert!(flags.language_encoding);
        assert!(flags.enhanced_deflating);

        let stored = GeneralPurposeFlags::from_raw(0x0000, 0);
        assert!(!stored.encrypted);
        assert!(!stored.enhanced_deflating);
    }

    #[test]
    fn eocd_sentinel_switches_zip64() {
        let mut raw = Vec::new();
        raw.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&0xFFFFu16.to_le_bytes());
        raw.extend_from_slice(&0xFFFFu16.to_le_bytes());
        raw.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        raw.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        raw.extend_from_slice(&0u16.to_le_bytes());

        let eocd = EndOfCentralDirectory::from_bytes(&raw).unwrap();
        assert!(eocd.is_zip64());
    }
}
