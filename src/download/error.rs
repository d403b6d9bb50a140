use std::io;

use thiserror::Error;

/// Why an acquisition session stopped
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HTTP client could not be created
    #[error("connection init failed: {0}")]
    ConnectionInit(String),

    /// Opening the connection or sending the request failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server answered with something other than the requested range
    #[error("unexpected HTTP status {status} for {range}")]
    HttpStatus { status: u16, range: String },

    /// The body stream broke off
    #[error("read error after {received} bytes: {source}")]
    Read {
        received: u64,
        #[source]
        source: io::Error,
    },

    /// The body ended early or ran long
    #[error("short chunk: expected {expected} bytes, received {received}")]
    ShortChunk { expected: u64, received: u64 },

    #[error("cannot open storage file: {0}")]
    StorageOpen(#[source] io::Error),

    #[error("storage write failed: {0}")]
    StorageWrite(#[source] io::Error),

    /// Reformatting the volume to make room failed
    #[error("storage reformat failed: {0}")]
    FormatFailed(#[source] io::Error),

    /// Still not enough room after a reformat
    #[error("not enough storage: {free} bytes free, {needed} needed")]
    NoSpace { free: u64, needed: u64 },

    /// Another transfer holds the frame file
    #[error("frame file is busy")]
    Busy,
}

impl DownloadError {
    /// Short stable token published through the status sink
    pub fn status_token(&self) -> &'static str {
        match self {
            DownloadError::ConnectionInit(_) => "connection_init_failed",
            DownloadError::Connect(_) => "connect_failed",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::Read { .. } => "read_error",
            DownloadError::ShortChunk { .. } => "short_chunk",
            DownloadError::StorageOpen(_) => "storage_open_failed",
            DownloadError::StorageWrite(_) => "storage_write_failed",
            DownloadError::FormatFailed(_) => "format_failed",
            DownloadError::NoSpace { .. } => "no_space",
            DownloadError::Busy => "busy",
        }
    }

    /// Errors worth another attempt of the same chunk. Storage problems are
    /// not: the next attempt would hit the same file.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DownloadError::ConnectionInit(_)
                | DownloadError::Connect(_)
                | DownloadError::HttpStatus { .. }
                | DownloadError::Read { .. }
                | DownloadError::ShortChunk { .. }
        )
    }
}
