//! Bounded tail scan for ZIP signatures.
//!
//! ZIP files are read from the end: the EOCD record sits in the final
//! 22 bytes unless an archive comment (or trailing garbage) pushes it
//! back, up to 65535 bytes. The scan reads the minimal tail first and
//! widens only when needed, which keeps remote sources down to one or
//! two Range requests.

use crate::error::{Result, ZipError};
use crate::io::RandomSource;

/// Locate the last occurrence of a 4-byte signature in the final
/// `minimum_bytes + maximum_length` bytes of the source.
///
/// The backward direction matters: when several candidate signatures
/// appear in the window (trailing junk, a stored inner archive), the
/// latest one is the authoritative record.
///
/// # Arguments
///
/// * `signature` - The 4 signature bytes as they appear on disk
/// * `minimum_bytes` - Fixed size of the record being sought
/// * `maximum_length` - Maximum extension of the search window
///
/// # Returns
///
/// `Some((absolute_offset, tail))` where `tail` holds the bytes from
/// the signature to the end of the source, or `None` if the signature
/// does not occur in the window.
///
/// # Errors
///
/// `BadFormat` if the source is smaller than `minimum_bytes`.
pub(crate) async fn find_last_signature<R: RandomSource + ?Sized>(
    source: &R,
    signature: &[u8],
    minimum_bytes: u64,
    maximum_length: u64,
) -> Result<Option<(u64, Vec<u8>)>> {
    let size = source.size();
    if size < minimum_bytes {
        return Err(ZipError::BadFormat("archive smaller than minimal record"));
    }

    // Fast path: a record with no trailing data starts exactly
    // minimum_bytes from the end.
    let offset = size - minimum_bytes;
    let mut buf = vec![0u8; minimum_bytes as usize];
    source.read_fully(offset, &mut buf).await?;
    if buf.starts_with(signature) {
        return Ok(Some((offset, buf)));
    }

    // Widen to the full window and rescan backwards so the latest
    // occurrence wins.
    let window = (minimum_bytes + maximum_length).min(size);
    let start = size - window;
    let mut buf = vec![0u8; window as usize];
    source.read_fully(start, &mut buf).await?;

    let last_candidate = buf.len() - minimum_bytes as usize;
    for i in (0..=last_candidate).rev() {
        if buf[i..].starts_with(signature) {
            let tail = buf.split_off(i);
            return Ok(Some((start + i as u64, tail)));
        }
    }

    Ok(None)
}
