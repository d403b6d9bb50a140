//! Chunked, range based acquisition of the frame file.
//!
//! The file is fetched in fixed size ranges, each over its own connection
//! and with its own retry budget. Chunks are strictly sequential: a chunk
//! that runs out of attempts ends the session and later chunks are never
//! requested.

use std::io::{self, Read, Seek, SeekFrom, Write};

use embedded_hal::delay::DelayNs;

use crate::config::FrameConfig;
use crate::epd::FrameGeometry;
use crate::keep_alive::KeepAlive;
use crate::status::TransferStatus;
use crate::storage::Storage;

mod client;
mod error;
mod plan;

pub use client::{status_accepted, RangeClient, RangeResponse};
pub use error::DownloadError;
pub use plan::{chunks, ChunkRange, RetryPolicy};

/// Body bytes copied per read
const READ_BUF: usize = 4096;

/// How a session ended
#[derive(Debug)]
pub enum Outcome {
    /// Every chunk arrived and the total matches the frame size
    Complete,
    /// All chunks were accepted yet the total is off
    Incomplete,
    Failed(DownloadError),
}

/// Result of one acquisition session
#[derive(Debug)]
pub struct DownloadReport {
    /// Bytes of the chunks that were fully received
    pub bytes: u64,
    pub expected: u64,
    pub outcome: Outcome,
}

impl DownloadReport {
    pub fn failed(error: DownloadError) -> Self {
        DownloadReport {
            bytes: 0,
            expected: 0,
            outcome: Outcome::Failed(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Complete)
    }

    pub fn status_token(&self) -> &'static str {
        match &self.outcome {
            Outcome::Complete => "ok",
            Outcome::Incomplete => "incomplete",
            Outcome::Failed(e) => e.status_token(),
        }
    }

    pub fn to_status(&self) -> TransferStatus {
        TransferStatus::new(self.bytes, self.is_success(), self.status_token())
    }
}

/// Parameters of an acquisition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquirer {
    /// Frame file name inside the storage
    pub file_name: String,
    /// Exact size of a complete frame
    pub expected: u64,
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    /// Free space demanded on top of `expected`
    pub margin: u64,
}

impl Acquirer {
    pub fn new(config: &FrameConfig, geometry: FrameGeometry) -> Self {
        Acquirer {
            file_name: config.file_name.clone(),
            expected: geometry.frame_size() as u64,
            chunk_size: config.chunk_size,
            retry: config.retry_policy(),
            margin: config.space_margin,
        }
    }

    /// Download `url` into the frame file.
    ///
    /// Never panics and never returns early without a report: every failure
    /// ends up in [`DownloadReport::outcome`].
    pub fn run<C, S, D, K>(
        &self,
        url: &str,
        client: &mut C,
        storage: &mut S,
        delay: &mut D,
        keep_alive: &mut K,
    ) -> DownloadReport
    where
        C: RangeClient,
        S: Storage,
        D: DelayNs,
        K: KeepAlive,
    {
        log::info!(
            "Downloading {} bytes from {} in chunks of {}",
            self.expected,
            url,
            self.chunk_size
        );

        let mut bytes = 0;
        let outcome = match self.transfer(url, client, storage, delay, keep_alive, &mut bytes) {
            Ok(()) if bytes == self.expected => Outcome::Complete,
            Ok(()) => Outcome::Incomplete,
            Err(e) => Outcome::Failed(e),
        };

        let report = DownloadReport {
            bytes,
            expected: self.expected,
            outcome,
        };
        match &report.outcome {
            Outcome::Complete => log::info!("Download complete, {} bytes", bytes),
            Outcome::Incomplete => log::error!(
                "Download incomplete: {} of {} bytes",
                bytes,
                self.expected
            ),
            Outcome::Failed(e) => log::error!("Download failed after {} bytes: {}", bytes, e),
        }
        report
    }

    fn transfer<C, S, D, K>(
        &self,
        url: &str,
        client: &mut C,
        storage: &mut S,
        delay: &mut D,
        keep_alive: &mut K,
        bytes: &mut u64,
    ) -> Result<(), DownloadError>
    where
        C: RangeClient,
        S: Storage,
        D: DelayNs,
        K: KeepAlive,
    {
        // the old frame does not count against the budget
        if let Err(e) = storage.remove(&self.file_name) {
            log::warn!("Could not remove old {}: {}", self.file_name, e);
        }
        self.ensure_space(storage)?;

        let mut file = storage
            .create(&self.file_name)
            .map_err(DownloadError::StorageOpen)?;
        let mut buf = vec![0u8; READ_BUF];

        for range in chunks(self.expected, self.chunk_size) {
            *bytes += self.fetch_chunk(url, &range, client, &mut file, &mut buf, delay, keep_alive)?;
        }
        file.flush().map_err(DownloadError::StorageWrite)?;
        Ok(())
    }

    /// Make room for the frame, reformatting the volume at most once
    fn ensure_space<S: Storage>(&self, storage: &mut S) -> Result<(), DownloadError> {
        let needed = self.expected + self.margin;
        let free = storage.free_space().map_err(DownloadError::StorageOpen)?;
        if free >= needed {
            return Ok(());
        }

        log::warn!(
            "Only {} bytes free, {} needed; reformatting storage",
            free,
            needed
        );
        storage.reformat().map_err(DownloadError::FormatFailed)?;

        let free = storage.free_space().map_err(DownloadError::StorageOpen)?;
        if free < needed {
            return Err(DownloadError::NoSpace { free, needed });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fetch_chunk<C, F, D, K>(
        &self,
        url: &str,
        range: &ChunkRange,
        client: &mut C,
        file: &mut F,
        buf: &mut [u8],
        delay: &mut D,
        keep_alive: &mut K,
    ) -> Result<u64, DownloadError>
    where
        C: RangeClient,
        F: Write + Seek,
        D: DelayNs,
        K: KeepAlive,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            keep_alive.feed();
            match self.try_chunk(url, range, client, file, buf, keep_alive) {
                Ok(received) => {
                    log::debug!("{} done on attempt {}", range, attempt);
                    return Ok(received);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    log::warn!(
                        "{} attempt {}/{} failed: {}",
                        range,
                        attempt,
                        max_attempts,
                        e
                    );
                    delay.delay_ms(self.retry.backoff_ms);
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("{} failed on attempt {}: {}", range, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    fn try_chunk<C, F, K>(
        &self,
        url: &str,
        range: &ChunkRange,
        client: &mut C,
        file: &mut F,
        buf: &mut [u8],
        keep_alive: &mut K,
    ) -> Result<u64, DownloadError>
    where
        C: RangeClient,
        F: Write + Seek,
        K: KeepAlive,
    {
        let response = client.get_range(url, range)?;
        if !status_accepted(response.status, range, self.expected) {
            return Err(DownloadError::HttpStatus {
                status: response.status,
                range: range.header_value(),
            });
        }

        file.seek(SeekFrom::Start(range.start))
            .map_err(DownloadError::StorageWrite)?;

        let expected = range.len();
        let mut body = response.body;
        let mut received: u64 = 0;
        loop {
            let n = match body.read(buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(DownloadError::Read { received, source }),
            };
            if received + n as u64 > expected {
                return Err(DownloadError::ShortChunk {
                    expected,
                    received: received + n as u64,
                });
            }
            file.write_all(&buf[..n])
                .map_err(DownloadError::StorageWrite)?;
            received += n as u64;
            keep_alive.feed();
        }

        if received != expected {
            return Err(DownloadError::ShortChunk { expected, received });
        }
        Ok(received)
    }
}

/// Something that can refill the frame file, moved into the background
/// download thread and handed back when it finishes.
pub trait Fetch {
    fn fetch<S: Storage>(&mut self, url: &str, storage: &mut S) -> DownloadReport;
}

/// An [`Acquirer`] bundled with the client, delay and keep-alive it runs on
pub struct Downloader<C, D, K> {
    pub acquirer: Acquirer,
    pub client: C,
    pub delay: D,
    pub keep_alive: K,
}

impl<C, D, K> Downloader<C, D, K> {
    pub fn new(acquirer: Acquirer, client: C, delay: D, keep_alive: K) -> Self {
        Downloader {
            acquirer,
            client,
            delay,
            keep_alive,
        }
    }
}

impl<C, D, K> Fetch for Downloader<C, D, K>
where
    C: RangeClient,
    D: DelayNs,
    K: KeepAlive,
{
    fn fetch<S: Storage>(&mut self, url: &str, storage: &mut S) -> DownloadReport {
        self.acquirer.run(
            url,
            &mut self.client,
            storage,
            &mut self.delay,
            &mut self.keep_alive,
        )
    }
}
