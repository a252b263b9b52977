//! Chunked read -> codec -> sink loop.
//!
//! The compressed payload is read in bounded chunks so that arbitrarily
//! large entries stream through constant memory. Chunks reach the sink
//! in ascending offset order, and the progress callback fires after
//! every input chunk with monotonically non-decreasing byte counts.

use crate::codec::Codec;
use crate::error::Result;
use crate::io::{RandomSource, Sink};
use crate::options::ProgressFn;

/// Drive one entry's payload through the codec into the sink.
///
/// # Arguments
///
/// * `start` - Absolute offset of the compressed payload
/// * `length` - Compressed payload length in bytes
/// * `chunk_size` - Upper bound on a single read
///
/// # Returns
///
/// The sink's finalization result.
pub(crate) async fn run<R, S>(
    mut codec: Box<dyn Codec>,
    source: &R,
    mut sink: S,
    start: u64,
    length: u64,
    chunk_size: usize,
    on_progress: Option<&ProgressFn>,
) -> Result<S::Output>
where
    R: RandomSource + ?Sized,
    S: Sink,
{
    codec.init().await?;
    sink.init().await?;

    let mut buf = vec![0u8; (chunk_size as u64).min(length) as usize];
    let mut consumed = 0u64;

    while consumed < length {
        let n = (chunk_size as u64).min(length - consumed) as usize;
        source.read_fully(start + consumed, &mut buf[..n]).await?;

        let out = codec.append(&buf[..n]).await?;
        if !out.is_empty() {
            sink.write(&out).await?;
        }

        consumed += n as u64;
        if let Some(progress) = on_progress {
            progress(consumed, length);
        }
    }

    let flush = codec.flush().await?;
    if !flush.data.is_empty() {
        sink.write(&flush.data).await?;
    }

    sink.finalize().await
}
