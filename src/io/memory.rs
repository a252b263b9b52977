use async_trait::async_trait;

use super::{RandomSource, Sink};
use crate::error::Result;

/// In-memory archive source backed by a byte buffer.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl RandomSource for MemorySource {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.data.len());
        let end = (start + buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Sink that collects the extracted entry into a `Vec<u8>`.
#[derive(Default)]
pub struct VecSink {
    buf: Vec<u8>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sink for VecSink {
    type Output = Vec<u8>;

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn finalize(self) -> Result<Vec<u8>> {
        Ok(self.buf)
    }
}
