//! Byte-range specifier parsing and validation

/// Inclusive byte span accepted against a known file size
///
/// Always satisfies `start <= end < file_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: u64,
    pub end: u64,
}

/// Why a range specifier was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Not of the form `bytes=start-end`
    Malformed,
    /// Well formed but outside the file
    Unsatisfiable,
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeError::Malformed => write!(f, "malformed range"),
            RangeError::Unsatisfiable => write!(f, "range not satisfiable"),
        }
    }
}

impl std::error::Error for RangeError {}

impl RangeRequest {
    /// Parse a `Range` header value against `file_size`
    ///
    /// Supports:
    /// - bytes=start-end
    /// - bytes=start-      (to end of file)
    /// - bytes=-suffix_len (last `suffix_len` bytes)
    ///
    /// Multiple ranges are not supported.
    pub fn parse(value: &str, file_size: u64) -> Result<Self, RangeError> {
        let value = value.trim();
        let rest = match value.get(..6) {
            Some(unit) if unit.eq_ignore_ascii_case("bytes=") => &value[6..],
            _ => return Err(RangeError::Malformed),
        };
        if rest.contains(',') {
            return Err(RangeError::Malformed);
        }
        let (start_str, end_str) = rest.split_once('-').ok_or(RangeError::Malformed)?;
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        let last = file_size.checked_sub(1).ok_or(RangeError::Unsatisfiable)?;

        if start_str.is_empty() {
            let len = parse_offset(end_str)?;
            if len == 0 {
                return Err(RangeError::Unsatisfiable);
            }
            return Ok(Self {
                start: file_size.saturating_sub(len),
                end: last,
            });
        }

        let start = parse_offset(start_str)?;
        let end = if end_str.is_empty() {
            last
        } else {
            parse_offset(end_str)?
        };

        if start > end || end > last {
            return Err(RangeError::Unsatisfiable);
        }
        Ok(Self { start, end })
    }

    /// Number of bytes in the span
    pub fn content_length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a 206 response
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, file_size)
    }
}

/// `Content-Range` value for a 416 response
pub fn unsatisfied_range(file_size: u64) -> String {
    format!("bytes */{}", file_size)
}

fn parse_offset(s: &str) -> Result<u64, RangeError> {
    // `u64::from_str` accepts a leading '+'
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    // All digits but too large for u64 is past any real file
    s.parse().map_err(|_| RangeError::Unsatisfiable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u64 = 1_048_576;

    #[test]
    fn test_parse_range_full() {
        let r = RangeRequest::parse("bytes=0-1023", SIZE).unwrap();
        assert_eq!(r, RangeRequest { start: 0, end: 1023 });
        assert_eq!(r.content_length(), 1024);
        assert_eq!(r.content_range(SIZE), "bytes 0-1023/1048576");
    }

    #[test]
    fn test_parse_range_open_ended() {
        let r = RangeRequest::parse("bytes=500-", SIZE).unwrap();
        assert_eq!(r, RangeRequest { start: 500, end: SIZE - 1 });
    }

    #[test]
    fn test_parse_range_suffix() {
        let r = RangeRequest::parse("bytes=-1024", SIZE).unwrap();
        assert_eq!(r, RangeRequest { start: SIZE - 1024, end: SIZE - 1 });

        // Suffix longer than the file covers the whole file
        let r = RangeRequest::parse("bytes=-5000", 100).unwrap();
        assert_eq!(r, RangeRequest { start: 0, end: 99 });
    }

    #[test]
    fn test_parse_range_single_byte_edges() {
        assert_eq!(
            RangeRequest::parse("bytes=0-0", SIZE).unwrap().content_length(),
            1
        );
        let last = RangeRequest::parse(&format!("bytes={}-{}", SIZE - 1, SIZE - 1), SIZE).unwrap();
        assert_eq!(last.content_length(), 1);
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        for spec in [
            "bytes=2000000-",
            "bytes=0-1048576",
            "bytes=1048576-1048576",
            "bytes=10-5",
            "bytes=-0",
            "bytes=99999999999999999999-",
        ] {
            assert_eq!(
                RangeRequest::parse(spec, SIZE),
                Err(RangeError::Unsatisfiable),
                "{}",
                spec
            );
        }
    }

    #[test]
    fn test_parse_range_malformed() {
        for spec in [
            "",
            "invalid",
            "items=0-1",
            "bytes=abc-def",
            "bytes=0-1,5-6",
            "bytes=5",
            "bytes=+1-2",
            "bytes=-",
        ] {
            assert_eq!(
                RangeRequest::parse(spec, SIZE),
                Err(RangeError::Malformed),
                "{}",
                spec
            );
        }
    }

    #[test]
    fn test_parse_range_case_and_whitespace() {
        assert_eq!(
            RangeRequest::parse("  Bytes= 10 - 20 ", SIZE).unwrap(),
            RangeRequest { start: 10, end: 20 }
        );
    }

    #[test]
    fn test_empty_file_rejects_every_range() {
        assert_eq!(
            RangeRequest::parse("bytes=0-", 0),
            Err(RangeError::Unsatisfiable)
        );
        assert_eq!(unsatisfied_range(0), "bytes */0");
    }

    #[test]
    fn test_every_accepted_range_is_inside_the_file() {
        let size = 64u64;
        for start in 0..size + 2 {
            for end in 0..size + 2 {
                let spec = format!("bytes={}-{}", start, end);
                match RangeRequest::parse(&spec, size) {
                    Ok(r) => {
                        assert!(r.start <= r.end && r.end < size);
                        assert_eq!(r.content_length(), end - start + 1);
                    }
                    Err(e) => {
                        assert_eq!(e, RangeError::Unsatisfiable);
                        assert!(start > end || end >= size);
                    }
                }
            }
        }
    }
}
