use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{RandomSource, Sink};
use crate::error::Result;

/// Local file source with random access support.
pub struct FileSource {
    file: std::fs::File,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

#[async_trait]
impl RandomSource for FileSource {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, offset)?)
        }

        #[cfg(not(any(unix, windows)))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            Ok(file.read(buf)?)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Sink that writes the extracted entry to a file on disk.
///
/// Parent directories are created on [`init`](Sink::init); the written
/// path is returned from [`finalize`](Sink::finalize).
pub struct FileSink {
    path: PathBuf,
    file: Option<fs::File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

#[async_trait]
impl Sink for FileSink {
    type Output = PathBuf;

    async fn init(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        self.file = Some(fs::File::create(&self.path).await?);
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if self.file.is_none() {
            self.init().await?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
        }
        Ok(())
    }

    async fn finalize(mut self) -> Result<PathBuf> {
        if self.file.is_none() {
            self.init().await?;
        }
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        Ok(self.path)
    }
}
