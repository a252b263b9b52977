mod http;
mod local;
mod memory;

pub use http::HttpSource;
pub use local::{FileSink, FileSource};
pub use memory::{MemorySource, VecSink};

use async_trait::async_trait;

use crate::error::{Result, ZipError};

/// Trait for random access reading from archive storage.
///
/// The reader calls [`init`](RandomSource::init) once at the start of
/// every operation; implementations that need deferred setup (opening a
/// connection, probing a remote size) can do it there, but it must be
/// idempotent. [`size`](RandomSource::size) must be valid once `init`
/// has returned.
///
/// A source is read-only and may be shared across any number of
/// concurrent extractions; `read_at` must be independently addressable
/// and non-mutating.
#[async_trait]
pub trait RandomSource: Send + Sync {
    /// Deferred, idempotent initialization. The default does nothing.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Total archive length in bytes.
    fn size(&self) -> u64;

    /// Read data at the specified offset into the buffer, returning the
    /// number of bytes read. A short read is not an error here; callers
    /// that need an exact length use [`read_fully`](RandomSource::read_fully).
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `buf.len()` bytes at `offset` or fail.
    ///
    /// Loops over `read_at` until the buffer is full; a zero-length read
    /// before that point means the archive is truncated.
    async fn read_fully(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(ZipError::BadFormat("unexpected end of archive"));
            }
            filled += n;
        }
        Ok(())
    }
}

/// Trait for receiving the extracted bytes of one entry.
///
/// Chunks arrive in order; [`finalize`](Sink::finalize) is called once
/// after the last chunk and yields a caller-defined result (a buffer, a
/// path, ...). A sink is used for a single extraction; on error the
/// partial output must be treated as invalid.
#[async_trait]
pub trait Sink: Send {
    /// The value produced when the sink is finalized.
    type Output: Send;

    /// Deferred, idempotent initialization. The default does nothing.
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Accept the next ordered chunk of decompressed data.
    async fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush any buffered state and produce the result value.
    async fn finalize(self) -> Result<Self::Output>;
}
