//! Splitting a download into range requests

use std::fmt;

/// One inclusive byte range of the frame file, fetched with a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Position in the chunk sequence, starting at 0
    pub index: usize,
    /// First byte offset
    pub start: u64,
    /// Last byte offset, inclusive like the `Range` header
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ChunkRange {
    /// Number of bytes the server must send for this range
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// `true` when the range spans a whole resource of `total` bytes, so a
    /// plain 200 answer is as good as a 206.
    pub fn covers(&self, total: u64) -> bool {
        self.start == 0 && self.len() == total
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {} [{}..={}]", self.index, self.start, self.end)
    }
}

/// Split `[0, total)` into ranges of at most `chunk_size` bytes.
///
/// A zero `chunk_size` fetches everything in one request.
pub fn chunks(total: u64, chunk_size: u64) -> impl Iterator<Item = ChunkRange> {
    let step = if chunk_size == 0 { total.max(1) } else { chunk_size };
    (0..total)
        .step_by(usize::try_from(step).unwrap_or(usize::MAX))
        .enumerate()
        .map(move |(index, start)| ChunkRange {
            index,
            start,
            end: (start + step).min(total) - 1,
        })
}

/// Per chunk retry bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per chunk, the first one included
    pub max_attempts: u32,
    /// Pause between two attempts of the same chunk
    pub backoff_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_splits_into_ten_chunks() {
        let ranges: Vec<ChunkRange> = chunks(960_000, 100_000).collect();
        assert_eq!(ranges.len(), 10);
        assert!(ranges[..9].iter().all(|r| r.len() == 100_000));
        assert_eq!(ranges[9].len(), 60_000);
        assert_eq!(ranges[9].end, 959_999);
        assert_eq!(ranges.iter().map(ChunkRange::len).sum::<u64>(), 960_000);
    }

    #[test]
    fn header_uses_inclusive_end() {
        let first = chunks(960_000, 100_000).next().unwrap();
        assert_eq!(first.header_value(), "bytes=0-99999");
        let fifth = chunks(960_000, 100_000).nth(4).unwrap();
        assert_eq!(fifth.header_value(), "bytes=400000-499999");
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let ranges: Vec<ChunkRange> = chunks(300, 100).collect();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2].header_value(), "bytes=200-299");
    }

    #[test]
    fn zero_chunk_size_means_one_request() {
        let ranges: Vec<ChunkRange> = chunks(960_000, 0).collect();
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].covers(960_000));
        assert!(!chunks(960_000, 100_000).next().unwrap().covers(960_000));
    }

    #[test]
    fn empty_resource_has_no_chunks() {
        assert_eq!(chunks(0, 100).count(), 0);
    }
}
