use std::io::Read;

use super::{ChunkRange, DownloadError};

/// Status line and streaming body of one range request
pub struct RangeResponse<B> {
    pub status: u16,
    pub body: B,
}

/// HTTP client able to fetch a byte range of a resource
///
/// Every call opens a fresh connection, so one stalled connection costs at
/// most one attempt of one chunk.
pub trait RangeClient {
    type Body<'a>: Read
    where
        Self: 'a;

    /// GET `url` with `Range: bytes=<start>-<end>`
    fn get_range(
        &mut self,
        url: &str,
        range: &ChunkRange,
    ) -> Result<RangeResponse<Self::Body<'_>>, DownloadError>;
}

/// `true` for a status that answers a request for `range` of a resource
/// expected to be `total` bytes
pub fn status_accepted(status: u16, range: &ChunkRange, total: u64) -> bool {
    match status {
        206 => true,
        200 => range.covers(total),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ok_only_for_whole_resource() {
        let whole = ChunkRange {
            index: 0,
            start: 0,
            end: 99,
        };
        let part = ChunkRange {
            index: 0,
            start: 0,
            end: 49,
        };
        assert!(status_accepted(206, &part, 100));
        assert!(status_accepted(200, &whole, 100));
        assert!(!status_accepted(200, &part, 100));
        assert!(!status_accepted(416, &part, 100));
    }
}
