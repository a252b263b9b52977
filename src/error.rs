//! Error types emitted by the reader.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Everything that can go wrong while parsing or extracting an archive.
///
/// Structural problems (missing or mis-signed fixed records) are
/// distinguished from unsupported-feature rejections and from data-level
/// failures (bad CRC, bad password) so callers can react differently to
/// each.
#[derive(Debug, Error)]
pub enum ZipError {
    /// Archive too small, or central directory size/offset inconsistent.
    #[error("malformed archive: {0}")]
    BadFormat(&'static str),

    /// No End of Central Directory signature in the tail scan window.
    #[error("end of central directory record not found")]
    EocdNotFound,

    /// ZIP64 EOCD signature absent at the offset given by the locator.
    #[error("zip64 end of central directory record not found")]
    Zip64EocdNotFound,

    /// ZIP64 locator signature absent immediately before the EOCD.
    #[error("zip64 end of central directory locator not found")]
    Zip64LocatorNotFound,

    /// Central file header signature absent at the expected offset.
    #[error("central directory file header not found")]
    CentralDirectoryNotFound,

    /// Local file header signature absent at the entry's offset.
    #[error("local file header not found")]
    LocalHeaderNotFound,

    /// A 32-bit field carried the ZIP64 sentinel but the ZIP64 extra
    /// field did not supply the 64-bit value.
    #[error("zip64 extra field missing a required value")]
    MissingZip64Field,

    /// The entry is encrypted and no password was supplied.
    #[error("entry is encrypted, password required")]
    Encrypted,

    /// AES strength other than AES-256.
    #[error("unsupported encryption strength: {strength}")]
    UnsupportedEncryption { strength: u8 },

    /// Compression method outside {STORE, DEFLATE}, or an AES wrapper
    /// whose outer method is not the AES sentinel.
    #[error("unsupported compression method: {method}")]
    UnsupportedCompression { method: u16 },

    /// CRC-32 of the decompressed data did not match the directory.
    #[error("crc32 mismatch: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// AES authentication failed, or the legacy preamble check byte did
    /// not match.
    #[error("invalid password")]
    InvalidPassword,

    /// The DEFLATE stream could not be decoded.
    #[error("corrupt deflate stream: {0}")]
    Inflate(#[from] flate2::DecompressError),

    /// An I/O error from the underlying source or sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An HTTP error from a remote source.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
