//! Extra-field decoding.
//!
//! The extra-field region is a sequence of `(u16 tag, u16 size, bytes)`
//! records. Parsing is fault-tolerant: a truncated or malformed tail
//! ends the walk but never fails the entry, matching how real archives
//! in the wild are built. Three tags get decoded views: ZIP64 (0x0001),
//! Unicode Path (0x7075) and the WinZip AES descriptor (0x9901).

use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

use crate::error::{Result, ZipError};

/// ZIP64 extended information.
pub const TAG_ZIP64: u16 = 0x0001;
/// Info-ZIP Unicode Path.
pub const TAG_UNICODE_PATH: u16 = 0x7075;
/// WinZip AES encryption descriptor.
pub const TAG_AES: u16 = 0x9901;

/// 32-bit sentinel marking a value promoted to the ZIP64 extra field.
pub const ZIP64_SENTINEL: u64 = 0xFFFF_FFFF;

/// Decoded ZIP64 extended information: only the fields whose 32-bit
/// directory value carried the sentinel are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Extra {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub offset: Option<u64>,
}

/// Decoded Info-ZIP Unicode Path field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodePathExtra {
    pub version: u8,
    /// CRC-32 of the original raw filename, as embedded in the field.
    pub crc32: u32,
    /// The UTF-8 replacement path.
    pub path: String,
    /// True when the embedded CRC matched the raw filename.
    pub valid: bool,
}

/// Decoded WinZip AES descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtra {
    /// 1 for AE-1 (CRC present), 2 for AE-2 (CRC zeroed).
    pub vendor_version: u16,
    pub vendor_id: u16,
    /// 1 = AES-128, 2 = AES-192, 3 = AES-256. Only 3 is supported.
    pub strength: u8,
    /// The real compression method wrapped by the AES envelope.
    pub compression_method: u16,
}

/// The parsed extra-field region of one entry.
#[derive(Debug, Clone, Default)]
pub struct ExtraFields {
    /// Raw payload per tag. Duplicate tags keep the first occurrence.
    pub fields: HashMap<u16, Vec<u8>>,
    pub zip64: Option<Zip64Extra>,
    pub unicode_path: Option<UnicodePathExtra>,
    pub aes: Option<AesExtra>,
}

impl ExtraFields {
    /// Walk the TLV region into a tag map. Never fails: a record whose
    /// declared size overruns the region is truncated and ends the walk.
    pub fn parse(raw: &[u8]) -> Self {
        let mut fields: HashMap<u16, Vec<u8>> = HashMap::new();
        let mut pos = 0;

        while pos + 4 <= raw.len() {
            let tag = LittleEndian::read_u16(&raw[pos..]);
            let size = LittleEndian::read_u16(&raw[pos + 2..]) as usize;
            let start = pos + 4;
            let end = (start + size).min(raw.len());

            fields.entry(tag).or_insert_with(|| raw[start..end].to_vec());

            if start + size > raw.len() {
                break;
            }
            pos = start + size;
        }

        let mut extra = ExtraFields {
            fields,
            ..Default::default()
        };
        extra.aes = extra.decode_aes();
        extra
    }

    /// Promote sentinel-valued sizes and offset from the ZIP64 field.
    ///
    /// The field carries a packed sequence of u64 values consumed in
    /// fixed order: uncompressed size, compressed size, local header
    /// offset - one value for each 32-bit field at its sentinel.
    ///
    /// # Errors
    ///
    /// `MissingZip64Field` if a sentinel is present but the field does
    /// not supply enough values (including the field being absent).
    pub fn apply_zip64(
        &mut self,
        uncompressed_size: &mut u64,
        compressed_size: &mut u64,
        offset: &mut u64,
    ) -> Result<()> {
        let needs = [
            *uncompressed_size == ZIP64_SENTINEL,
            *compressed_size == ZIP64_SENTINEL,
            *offset == ZIP64_SENTINEL,
        ];
        if !needs.iter().any(|&n| n) {
            return Ok(());
        }

        let payload = self
            .fields
            .get(&TAG_ZIP64)
            .ok_or(ZipError::MissingZip64Field)?;

        let mut view = Zip64Extra::default();
        let mut pos = 0;
        let mut take = |out: &mut u64| -> Result<u64> {
            if pos + 8 > payload.len() {
                return Err(ZipError::MissingZip64Field);
            }
            let v = LittleEndian::read_u64(&payload[pos..]);
            pos += 8;
            *out = v;
            Ok(v)
        };

        if needs[0] {
            view.uncompressed_size = Some(take(uncompressed_size)?);
        }
        if needs[1] {
            view.compressed_size = Some(take(compressed_size)?);
        }
        if needs[2] {
            view.offset = Some(take(offset)?);
        }

        self.zip64 = Some(view);
        Ok(())
    }

    /// Decode the Unicode Path field and, when its embedded CRC matches
    /// the CRC-32 of the raw filename, return the replacement path.
    ///
    /// The embedded CRC is read big-endian and compared against the
    /// checksum of the filename bytes as stored in the directory.
    pub fn apply_unicode_path(&mut self, raw_filename: &[u8]) -> Option<String> {
        let payload = self.fields.get(&TAG_UNICODE_PATH)?;
        if payload.len() < 5 {
            return None;
        }

        let version = payload[0];
        let embedded_crc = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let path = String::from_utf8_lossy(&payload[5..]).into_owned();
        let valid = embedded_crc == crc32fast::hash(raw_filename);

        self.unicode_path = Some(UnicodePathExtra {
            version,
            crc32: embedded_crc,
            path: path.clone(),
            valid,
        });

        valid.then_some(path)
    }

    fn decode_aes(&self) -> Option<AesExtra> {
        let payload = self.fields.get(&TAG_AES)?;
        if payload.len() < 7 {
            return None;
        }
        Some(AesExtra {
            vendor_version: LittleEndian::read_u16(&payload[0..]),
            vendor_id: LittleEndian::read_u16(&payload[2..]),
            strength: payload[4],
            compression_method: LittleEndian::read_u16(&payload[5..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(tag: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn duplicate_tags_keep_first() {
        let mut raw = tlv(0x1234, b"first");
        raw.extend_from_slice(&tlv(0x1234, b"second"));
        let extra = ExtraFields::parse(&raw);
        assert_eq!(extra.fields[&0x1234], b"first");
    }

    #[test]
    fn truncated_tail_is_tolerated() {
        let mut raw = tlv(0x1234, b"ok");
        // declared size 200, only 3 bytes present
        raw.extend_from_slice(&0x5678u16.to_le_bytes());
        raw.extend_from_slice(&200u16.to_le_bytes());
        raw.extend_from_slice(b"abc");
        let extra = ExtraFields::parse(&raw);
        assert_eq!(extra.fields[&0x1234], b"ok");
        assert_eq!(extra.fields[&0x5678], b"abc");
    }

    #[test]
    fn zip64_promotes_in_fixed_order() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1_0000_0000u64.to_le_bytes());
        payload.extend_from_slice(&0x2_0000_0000u64.to_le_bytes());
        let raw = tlv(TAG_ZIP64, &payload);

        let mut extra = ExtraFields::parse(&raw);
        let mut usize_ = ZIP64_SENTINEL;
        let mut csize = ZIP64_SENTINEL;
        let mut offset = 42u64;
        extra
            .apply_zip64(&mut usize_, &mut csize, &mut offset)
            .unwrap();
        assert_eq!(usize_, 0x1_0000_0000);
        assert_eq!(csize, 0x2_0000_0000);
        assert_eq!(offset, 42);
        assert_eq!(
            extra.zip64.unwrap(),
            Zip64Extra {
                uncompressed_size: Some(0x1_0000_0000),
                compressed_size: Some(0x2_0000_0000),
                offset: None,
            }
        );
    }

    #[test]
    fn zip64_sentinel_without_field_fails() {
        let mut extra = ExtraFields::parse(&[]);
        let mut usize_ = ZIP64_SENTINEL;
        let mut csize = 10u64;
        let mut offset = 0u64;
        let err = extra
            .apply_zip64(&mut usize_, &mut csize, &mut offset)
            .unwrap_err();
        assert!(matches!(err, ZipError::MissingZip64Field));
    }

    #[test]
    fn zip64_short_payload_fails() {
        // sentinel for two fields, payload has only one u64
        let raw = tlv(TAG_ZIP64, &1024u64.to_le_bytes());
        let mut extra = ExtraFields::parse(&raw);
        let mut usize_ = ZIP64_SENTINEL;
        let mut csize = ZIP64_SENTINEL;
        let mut offset = 0u64;
        let err = extra
            .apply_zip64(&mut usize_, &mut csize, &mut offset)
            .unwrap_err();
        assert!(matches!(err, ZipError::MissingZip64Field));
    }

    #[test]
    fn unicode_path_overrides_on_crc_match() {
        let raw_name = [0x82u8]; // é in CP-437
        let mut payload = vec![1u8];
        payload.extend_from_slice(&crc32fast::hash(&raw_name).to_be_bytes());
        payload.extend_from_slice("\u{00e9}".as_bytes());
        let raw = tlv(TAG_UNICODE_PATH, &payload);

        let mut extra = ExtraFields::parse(&raw);
        assert_eq!(extra.apply_unicode_path(&raw_name).as_deref(), Some("\u{00e9}"));
        assert!(extra.unicode_path.as_ref().unwrap().valid);
    }

    #[test]
    fn unicode_path_ignored_on_crc_mismatch() {
        let raw_name = [0x82u8];
        let mut payload = vec![1u8];
        payload.extend_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        payload.extend_from_slice("nope".as_bytes());
        let raw = tlv(TAG_UNICODE_PATH, &payload);

        let mut extra = ExtraFields::parse(&raw);
        assert_eq!(extra.apply_unicode_path(&raw_name), None);
        assert!(!extra.unicode_path.as_ref().unwrap().valid);
    }

    #[test]
    fn aes_descriptor_decodes() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u16.to_le_bytes()); // AE-2
        payload.extend_from_slice(b"AE");
        payload.push(3); // AES-256
        payload.extend_from_slice(&8u16.to_le_bytes()); // wrapped DEFLATE
        let raw = tlv(TAG_AES, &payload);

        let extra = ExtraFields::parse(&raw);
        let aes = extra.aes.unwrap();
        assert_eq!(aes.vendor_version, 2);
        assert_eq!(aes.strength, 3);
        assert_eq!(aes.compression_method, 8);
    }
}
