use crate::entities::InfoHash;
use crate::errors::DomainError;
use serde::{Deserialize, Serialize};

/// A `Range: bytes=...` header as sent by the client, before it is checked
/// against the size of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeRequest {
    /// `bytes=start-` or `bytes=start-end`
    From { start: u64, end: Option<u64> },
    /// `bytes=-len`, the last `len` bytes
    Suffix(u64),
}

impl RangeRequest {
    /// Returns `None` for headers that cannot be honoured (other units,
    /// multiple ranges, garbage); those are served as a full response.
    pub fn parse(header: &str) -> Option<Self> {
        let (unit, spec) = header.trim().split_once('=')?;
        if !unit.trim().eq_ignore_ascii_case("bytes") || spec.contains(',') {
            return None;
        }

        let (start, end) = spec.trim().split_once('-')?;
        match (start.trim(), end.trim()) {
            ("", "") => None,
            ("", suffix) => suffix.parse().ok().map(RangeRequest::Suffix),
            (start, "") => start
                .parse()
                .ok()
                .map(|start| RangeRequest::From { start, end: None }),
            (start, end) => Some(RangeRequest::From {
                start: start.parse().ok()?,
                end: Some(end.parse().ok()?),
            }),
        }
    }

    /// Resolves the request against the current file size. An end past EOF
    /// is clamped; a start at or after EOF is unsatisfiable.
    pub fn resolve(&self, size: u64) -> Result<ByteRange, DomainError> {
        let unsatisfiable = DomainError::RangeUnsatisfiable { size };
        if size == 0 {
            return Err(unsatisfiable);
        }
        let last = size - 1;

        match *self {
            RangeRequest::From { start, end } => {
                let end = end.unwrap_or(last).min(last);
                if start > end {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange { start, end })
            }
            RangeRequest::Suffix(0) => Err(unsatisfiable),
            RangeRequest::Suffix(len) => Ok(ByteRange {
                start: size - len.min(size),
                end: last,
            }),
        }
    }
}

/// Inclusive byte span `[start, end]` known to lie inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range_header(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// One `/stream/:hash/:index` request. Lives only for the request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub info_hash: InfoHash,
    pub file_index: usize,
    pub range: Option<RangeRequest>,
}

impl StreamRequest {
    pub fn new(info_hash: InfoHash, file_index: usize, range_header: Option<&str>) -> Self {
        Self {
            info_hash,
            file_index,
            range: range_header.and_then(RangeRequest::parse),
        }
    }
}
