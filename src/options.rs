//! Option records for the reader.
//!
//! Options exist at two levels: a [`ReaderOptions`] record attached to
//! the reader itself, and per-call records ([`ListOptions`],
//! [`ReadOptions`]). Every field is optional; at the start of an
//! operation the two records are merged field-wise, the call level
//! winning over the reader level and built-in defaults filling the rest.

use std::sync::Arc;

use crate::codec::CodecFactory;
use crate::zip::charset::Charset;

/// Default chunk size for the streaming pipeline: 512 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Progress callback: `(bytes_consumed, total_compressed_bytes)`.
///
/// Invoked after each input chunk during extraction. Successive calls
/// within one extraction are monotonically non-decreasing in the first
/// argument.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// Reader-level defaults, applied to every operation unless a per-call
/// record overrides them.
#[derive(Default)]
pub struct ReaderOptions {
    /// Fallback charset for filenames when the language encoding flag is
    /// unset. Defaults to CP-437.
    pub filename_encoding: Option<Charset>,
    /// Fallback charset for comments. Defaults to CP-437.
    pub comment_encoding: Option<Charset>,
    /// Password for encrypted entries.
    pub password: Option<String>,
    /// Verify the decompressed CRC-32 against the directory value.
    pub check_crc: Option<bool>,
    /// Input chunk size for the streaming pipeline.
    pub chunk_size: Option<usize>,
    /// Codec factory used to build the per-entry transform chain.
    /// Defaults to the built-in STORE/DEFLATE/AES implementation.
    pub codec_factory: Option<Arc<dyn CodecFactory>>,
}

/// Per-call options for entry enumeration.
#[derive(Default, Clone, Copy)]
pub struct ListOptions {
    pub filename_encoding: Option<Charset>,
    pub comment_encoding: Option<Charset>,
}

/// Per-call options for extraction of one entry.
#[derive(Default)]
pub struct ReadOptions {
    /// Password override for this entry.
    pub password: Option<String>,
    /// CRC verification override for this entry.
    pub check_crc: Option<bool>,
    /// Chunk size override for this entry.
    pub chunk_size: Option<usize>,
    /// Progress callback, invoked after each input chunk.
    pub on_progress: Option<Box<ProgressFn>>,
}

impl ReaderOptions {
    /// Effective charsets for an enumeration call.
    pub(crate) fn decode_charsets(&self, call: &ListOptions) -> (Charset, Charset) {
        let filename = call
            .filename_encoding
            .or(self.filename_encoding)
            .unwrap_or(Charset::Cp437);
        let comment = call
            .comment_encoding
            .or(self.comment_encoding)
            .unwrap_or(Charset::Cp437);
        (filename, comment)
    }
}
