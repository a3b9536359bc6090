use crate::errors::{BlobError, BlobResult};

/// Inclusive byte interval `start..=end` inside a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// The whole blob, or `None` for an empty one.
    pub fn full(length: u64) -> Option<Self> {
        length.checked_sub(1).map(|end| Self { start: 0, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a 206 answer.
    pub fn content_range(&self, length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, length)
    }

    /// Parses a `Range` header of the form `bytes=<start>-<end>?` against a
    /// blob of `length` bytes.
    ///
    /// An omitted end means the last byte; an end past the last byte is
    /// clamped. Everything else that cannot be served as a single contiguous
    /// range is an `InvalidRange`: other units, multiple ranges, suffix ranges
    /// (`bytes=-N`), unparsable numbers, `start > end` and `start >= length`.
    pub fn parse(header: &str, length: u64) -> BlobResult<Self> {
        let range_set = header
            .trim()
            .strip_prefix("bytes=")
            .ok_or_else(|| BlobError::invalid_range("only the bytes unit is supported", length))?;
        if range_set.contains(',') {
            return Err(BlobError::invalid_range("multiple ranges are not supported", length));
        }
        let (start, end) = range_set
            .split_once('-')
            .ok_or_else(|| BlobError::invalid_range("missing '-' separator", length))?;
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() {
            return Err(BlobError::invalid_range("a start offset is required", length));
        }
        let start: u64 = start
            .parse()
            .map_err(|_| BlobError::invalid_range("start offset is not a number", length))?;
        if start >= length {
            return Err(BlobError::invalid_range(
                format!("start {} is beyond the {} byte blob", start, length),
                length,
            ));
        }
        let last = length - 1;
        let end = if end.is_empty() {
            last
        } else {
            let end: u64 = end
                .parse()
                .map_err(|_| BlobError::invalid_range("end offset is not a number", length))?;
            end.min(last)
        };
        if start > end {
            return Err(BlobError::invalid_range(format!("start {} is after end {}", start, end), length));
        }
        Ok(Self { start, end })
    }
}
