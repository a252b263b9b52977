//! HTTP Range request source for remote archives.
//!
//! Random-access reading over HTTP (RFC 7233 byte ranges), so only the
//! archive tail and the chosen entries are ever downloaded. A range
//! answer is allowed to be shorter than asked for; the source keeps
//! requesting the remainder until the read window is filled.

use async_trait::async_trait;
use log::warn;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::RandomSource;
use crate::error::{Result, ZipError};

/// Attempts per range request before a transient failure is surfaced.
const MAX_ATTEMPTS: u32 = 4;
/// Delay before the first retry; doubled on every further attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

fn protocol_error(message: String) -> ZipError {
    io::Error::new(io::ErrorKind::InvalidData, message).into()
}

/// HTTP Range source for remote ZIP archives.
///
/// The remote server must accept byte ranges (`Accept-Ranges: bytes`)
/// and report a `Content-Length` on HEAD; both are checked once in
/// [`connect`](HttpSource::connect).
pub struct HttpSource {
    client: Client,
    url: String,
    /// Archive length, taken from the HEAD probe.
    size: u64,
    /// Cumulative payload bytes received over the network.
    transferred: AtomicU64,
}

impl HttpSource {
    /// Probe the URL and build a source for it.
    ///
    /// # Errors
    ///
    /// Fails when the server is unreachable, answers HEAD with an error
    /// status, does not accept byte ranges, or reports no usable
    /// `Content-Length`.
    pub async fn connect(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let probe = client.head(&url).send().await?.error_for_status()?;

        let accepts_ranges = probe
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains("bytes"));
        if !accepts_ranges {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "server does not accept byte ranges",
            )
            .into());
        }

        let size = probe
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| protocol_error("missing or unparsable Content-Length".into()))?;

        Ok(Self {
            client,
            url,
            size,
            transferred: AtomicU64::new(0),
        })
    }

    /// Cumulative payload bytes received from the server, for bandwidth
    /// statistics.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Issue one ranged GET for `first..=last`, retrying transient
    /// transport failures (timeouts, refused connections) with doubling
    /// backoff. The body may be shorter than the requested range.
    async fn fetch_range(&self, first: u64, last: u64) -> Result<Vec<u8>> {
        let mut attempt = 0;
        let mut delay = BACKOFF_BASE;
        loop {
            attempt += 1;
            let sent = self
                .client
                .get(&self.url)
                .header(RANGE, format!("bytes={first}-{last}"))
                .send()
                .await;

            match sent {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    return Ok(resp.bytes().await?.to_vec());
                }
                Ok(resp) => {
                    return Err(protocol_error(format!(
                        "range request answered with status {}",
                        resp.status()
                    )));
                }
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    warn!("range request failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl RandomSource for HttpSource {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }
        let last = (offset + buf.len() as u64).min(self.size) - 1;
        let window = (last - offset + 1) as usize;

        let mut filled = 0;
        while filled < window {
            let body = self.fetch_range(offset + filled as u64, last).await?;
            if body.is_empty() {
                return Err(protocol_error("empty range response".into()));
            }
            let n = body.len().min(window - filled);
            buf[filled..filled + n].copy_from_slice(&body[..n]);
            self.transferred.fetch_add(n as u64, Ordering::Relaxed);
            filled += n;
        }

        Ok(filled)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
