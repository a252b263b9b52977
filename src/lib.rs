//! # streamzip
//!
//! A streaming ZIP archive reader over random-access sources.
//!
//! The reader never touches the filesystem or the network by itself:
//! archive bytes come from anything implementing [`RandomSource`]
//! (a local file, an in-memory buffer, an HTTP server answering Range
//! requests), and extracted bytes go into anything implementing
//! [`Sink`]. Because ZIP archives are parsed from the end, listing a
//! remote archive costs one or two Range requests, and extracting one
//! entry fetches only that entry's bytes.
//!
//! ## Features
//!
//! - Entry enumeration from the central directory, ZIP64 included
//! - Streaming extraction with bounded memory and progress reporting
//! - STORED and DEFLATE compression
//! - WinZip AES-256 (AE-1/AE-2) and legacy PKWARE decryption
//! - CP-437 and UTF-8 filename decoding, Unicode Path extra fields
//! - Optional CRC-32 verification of extracted data
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamzip::{HttpSource, ZipReader};
//!
//! #[tokio::main]
//! async fn main() -> streamzip::Result<()> {
//!     // Create a reader for a remote ZIP file
//!     let source = Arc::new(HttpSource::connect("https://example.com/archive.zip".to_string()).await?);
//!     let reader = ZipReader::new(source);
//!
//!     // List all entries in the archive
//!     for entry in reader.list_entries().await? {
//!         println!("{}", entry.filename);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod io;
pub mod options;
pub mod zip;

pub use codec::{Codec, CodecConfig, CodecFactory, CodecFlush, DefaultCodecFactory, EncryptionSpec};
pub use error::{Result, ZipError};
pub use io::{FileSink, FileSource, HttpSource, MemorySource, RandomSource, Sink, VecSink};
pub use options::{ListOptions, ProgressFn, ReadOptions, ReaderOptions};
pub use zip::{
    Charset, CompressionMethod, GeneralPurposeFlags, ZipDateTime, ZipFileEntry, ZipParser,
    ZipReader,
};
