//! HTTP Range header parsing for torrent content serving.

use axum::http::{HeaderMap, header};

/// A parsed `bytes=start-end` range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive end; `None` means "to the end of the content".
    pub end: Option<u64>,
}

/// Parses the `Range` header into a single byte range.
///
/// Only the `bytes=start-end` and `bytes=start-` forms are supported;
/// anything else (suffix ranges, multiple ranges, malformed input) returns
/// `None` and the caller serves the full content.
pub fn parse_range_header(headers: &HeaderMap) -> Option<ByteRange> {
    let range_header = headers.get(header::RANGE)?.to_str().ok()?;

    if !range_header.starts_with("bytes=") {
        return None;
    }

    let range_str = &range_header[6..];
    let (start_str, end_str) = range_str.split_once('-')?;

    let start = start_str.parse::<u64>().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse::<u64>().ok()?)
    };

    Some(ByteRange { start, end })
}

/// Resolves a parsed range against the content length.
///
/// Clamps the end to the final byte and rejects ranges that start at or
/// past the end of content. Returns `(start, inclusive_end)`.
pub fn resolve_range(range: ByteRange, length: u64) -> Option<(u64, u64)> {
    if length == 0 || range.start >= length {
        return None;
    }

    let end = range.end.unwrap_or(length - 1).min(length - 1);
    if range.start > end {
        return None;
    }

    Some((range.start, end))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_parse_closed_range() {
        let range = parse_range_header(&headers("bytes=100-199")).unwrap();
        assert_eq!(
            range,
            ByteRange {
                start: 100,
                end: Some(199)
            }
        );
    }

    #[test]
    fn test_parse_open_ended_range() {
        let range = parse_range_header(&headers("bytes=500-")).unwrap();
        assert_eq!(range, ByteRange { start: 500, end: None });
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_range_header(&headers("invalid")).is_none());
        assert!(parse_range_header(&headers("bytes=-500")).is_none());
        assert!(parse_range_header(&headers("bytes=a-b")).is_none());
        assert!(parse_range_header(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_resolve_clamps_end() {
        let range = ByteRange {
            start: 100,
            end: Some(999),
        };
        assert_eq!(resolve_range(range, 500), Some((100, 499)));
    }

    #[test]
    fn test_resolve_open_end() {
        let range = ByteRange { start: 10, end: None };
        assert_eq!(resolve_range(range, 100), Some((10, 99)));
    }

    #[test]
    fn test_resolve_rejects_start_past_end() {
        let range = ByteRange { start: 500, end: Some(599) };
        assert_eq!(resolve_range(range, 400), None);
        assert_eq!(resolve_range(range, 0), None);
    }
}
