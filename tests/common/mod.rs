//! Shared archive fixtures.
//!
//! Archives are built in code: Zip32 with fixed timestamps, explicit
//! sizes and no data descriptors, so the offsets recorded in the
//! central directory are exact and every byte is accounted for.
#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn tlv(tag: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// One file to place into a fixture archive.
pub struct FileSpec {
    pub name: Vec<u8>,
    pub payload: Vec<u8>,
    /// Method field as stored in both headers (0, 8, or 99 for AES).
    pub method: u16,
    pub flags: u16,
    /// Stored bytes; derived from `payload` and `method` when `None`.
    pub data: Option<Vec<u8>>,
    /// CRC field override (AE-2 stores 0, corruption tests lie here).
    pub crc32: Option<u32>,
    /// (uncompressed, compressed) size field overrides.
    pub sizes: Option<(u32, u32)>,
    /// Extra field bytes, used verbatim in both headers.
    pub extra: Vec<u8>,
    pub external_attrs: u32,
}

impl Default for FileSpec {
    fn default() -> Self {
        Self {
            name: b"file.bin".to_vec(),
            payload: Vec::new(),
            method: 0,
            flags: 0,
            data: None,
            crc32: None,
            sizes: None,
            extra: Vec::new(),
            external_attrs: 0,
        }
    }
}

/// Assemble a Zip32 archive: local records, central directory, optional
/// junk between directory and EOCD, EOCD, optional comment.
pub fn build_zip(files: &[FileSpec], tail_garbage: &[u8], comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut cd = Vec::new();

    for file in files {
        let data = match &file.data {
            Some(d) => d.clone(),
            None if file.method == 8 => deflate(&file.payload),
            None => file.payload.clone(),
        };
        let crc = file.crc32.unwrap_or_else(|| crc32fast::hash(&file.payload));
        let (uncompressed, compressed) = file
            .sizes
            .unwrap_or((file.payload.len() as u32, data.len() as u32));
        let local_offset = out.len() as u32;

        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&file.flags.to_le_bytes());
        out.extend_from_slice(&file.method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0x58A6u16.to_le_bytes()); // 2024-05-06
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&compressed.to_le_bytes());
        out.extend_from_slice(&uncompressed.to_le_bytes());
        out.extend_from_slice(&(file.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(file.extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&file.name);
        out.extend_from_slice(&file.extra);
        out.extend_from_slice(&data);

        cd.extend_from_slice(b"PK\x01\x02");
        cd.extend_from_slice(&0x031Eu16.to_le_bytes()); // made by: unix
        cd.extend_from_slice(&20u16.to_le_bytes());
        cd.extend_from_slice(&file.flags.to_le_bytes());
        cd.extend_from_slice(&file.method.to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes());
        cd.extend_from_slice(&0x58A6u16.to_le_bytes());
        cd.extend_from_slice(&crc.to_le_bytes());
        cd.extend_from_slice(&compressed.to_le_bytes());
        cd.extend_from_slice(&uncompressed.to_le_bytes());
        cd.extend_from_slice(&(file.name.len() as u16).to_le_bytes());
        cd.extend_from_slice(&(file.extra.len() as u16).to_le_bytes());
        cd.extend_from_slice(&0u16.to_le_bytes()); // comment len
        cd.extend_from_slice(&0u16.to_le_bytes()); // disk start
        cd.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        cd.extend_from_slice(&file.external_attrs.to_le_bytes());
        cd.extend_from_slice(&local_offset.to_le_bytes());
        cd.extend_from_slice(&file.name);
        cd.extend_from_slice(&file.extra);
    }

    let cd_offset = out.len() as u32;
    let cd_size = cd.len() as u32;
    out.extend_from_slice(&cd);
    out.extend_from_slice(tail_garbage);

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    out.extend_from_slice(comment);

    out
}
