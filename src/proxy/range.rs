//! Byte Range Parsing
//!
//! Single-range `Range: bytes=...` support for object GETs. Anything the
//! proxy does not understand (other units, multiple ranges, malformed
//! numbers) is ignored and the full object is served.

use crate::error::{CacheError, Result};

/// Inclusive byte range within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Resolves a `Range` header against an object of `size` bytes.
///
/// Returns `Ok(None)` when the header should be ignored and
/// `RangeNotSatisfiable` when it asks for bytes past the end.
pub fn parse_range(header: &str, size: u64) -> Result<Option<ByteRange>> {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if spec.contains(',') {
        return Ok(None);
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return Ok(None);
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix form: the final N bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || size == 0 {
            return Err(CacheError::RangeNotSatisfiable(size));
        }
        let start = size.saturating_sub(suffix);
        return Ok(Some(ByteRange {
            start,
            end: size - 1,
        }));
    }

    let Ok(start) = first.parse::<u64>() else {
        return Ok(None);
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return Ok(None),
        }
    };

    if start >= size {
        return Err(CacheError::RangeNotSatisfiable(size));
    }
    let end = end.map_or(size - 1, |end| end.min(size - 1));
    Ok(Some(ByteRange { start, end }))
}
