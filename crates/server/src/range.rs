/// Inclusive byte window within a file of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Header the parser cannot make sense of. Callers ignore it and serve
    /// the whole file.
    Malformed,
    /// Well-formed but entirely outside the file; answer 416.
    Unsatisfiable,
}

/// Parses a `Range` header against a file size. Only single ranges are
/// supported; multi-range requests are treated as malformed.
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Malformed)?;
    if spec.contains(',') {
        return Err(RangeError::Malformed);
    }
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }

    let (start_str, end_str) = spec.split_once('-').ok_or(RangeError::Malformed)?;

    // Suffix form: the last N bytes.
    if start_str.is_empty() {
        let suffix: u64 = end_str.parse().map_err(|_| RangeError::Malformed)?;
        if suffix == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        });
    }

    let start: u64 = start_str.parse().map_err(|_| RangeError::Malformed)?;
    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }

    let end = if end_str.is_empty() {
        size - 1
    } else {
        let end: u64 = end_str.parse().map_err(|_| RangeError::Malformed)?;
        if end < start {
            return Err(RangeError::Malformed);
        }
        end.min(size - 1)
    };

    Ok(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::{parse_range, ByteRange, RangeError};

    #[test]
    fn parses_open_ended_range() {
        let range = parse_range("bytes=0-", 100).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 99 });
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn parses_closed_range() {
        let range = parse_range("bytes=10-19", 100).unwrap();
        assert_eq!(range, ByteRange { start: 10, end: 19 });
        assert_eq!(range.len(), 10);
    }

    #[test]
    fn clamps_end_beyond_file() {
        let range = parse_range("bytes=90-200", 100).unwrap();
        assert_eq!(range, ByteRange { start: 90, end: 99 });
    }

    #[test]
    fn parses_suffix_range() {
        let range = parse_range("bytes=-10", 100).unwrap();
        assert_eq!(range, ByteRange { start: 90, end: 99 });
    }

    #[test]
    fn oversized_suffix_covers_whole_file() {
        let range = parse_range("bytes=-500", 100).unwrap();
        assert_eq!(range, ByteRange { start: 0, end: 99 });
    }

    #[test]
    fn rejects_multiple_ranges() {
        assert_eq!(parse_range("bytes=0-1,2-3", 100), Err(RangeError::Malformed));
    }

    #[test]
    fn rejects_reversed_range() {
        assert_eq!(parse_range("bytes=10-5", 100), Err(RangeError::Malformed));
    }

    #[test]
    fn rejects_missing_unit_and_garbage() {
        assert_eq!(parse_range("0-10", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=abc-", 100), Err(RangeError::Malformed));
        assert_eq!(parse_range("bytes=10", 100), Err(RangeError::Malformed));
    }

    #[test]
    fn start_beyond_file_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=100-", 100), Err(RangeError::Unsatisfiable));
    }

    #[test]
    fn empty_file_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=0-", 0), Err(RangeError::Unsatisfiable));
    }

    #[test]
    fn zero_suffix_is_unsatisfiable() {
        assert_eq!(parse_range("bytes=-0", 100), Err(RangeError::Unsatisfiable));
    }
}
