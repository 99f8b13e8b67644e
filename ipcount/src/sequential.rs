//! Single-threaded reference scanner: one line at a time, in file order.

use crate::bitmap::PresenceBitmap;
use crate::codec;
use crate::error::{CountError, Result};
use crate::{CountReport, DistinctCounter, ScanStats};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const READ_BUFFER: usize = 1 << 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialCounter;

impl SequentialCounter {
    pub fn new() -> Self {
        Self
    }
}

impl DistinctCounter for SequentialCounter {
    fn report(&self, path: &Path) -> Result<CountReport> {
        let start = Instant::now();
        let file = File::open(path).map_err(|source| CountError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut bitmap = PresenceBitmap::new();
        let stats = scan_lines(BufReader::with_capacity(READ_BUFFER, file), &mut bitmap)?;
        let distinct = bitmap.count();

        info!(
            ?path,
            lines = stats.lines,
            malformed = stats.malformed,
            distinct,
            elapsed = ?start.elapsed(),
            "sequential scan complete"
        );
        Ok(CountReport { distinct, stats })
    }
}

/// Decodes every line of `reader` into `bitmap`.
///
/// Lines are trimmed of ASCII whitespace before decoding; lines that fail to
/// decode are logged and skipped. Only I/O errors end the scan early.
pub fn scan_lines<R: BufRead>(mut reader: R, bitmap: &mut PresenceBitmap) -> Result<ScanStats> {
    let mut stats = ScanStats::default();
    let mut line = Vec::with_capacity(64);

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        stats.lines += 1;

        let text = line.trim_ascii();
        match codec::decode(text) {
            Ok(addr) => bitmap.set(addr),
            Err(reason) => {
                stats.malformed += 1;
                warn!(
                    line_no = stats.lines,
                    text = %String::from_utf8_lossy(text),
                    %reason,
                    "skipping malformed address"
                );
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scan(input: &str) -> (u64, ScanStats) {
        let mut bitmap = PresenceBitmap::new();
        let stats = scan_lines(Cursor::new(input.as_bytes()), &mut bitmap).unwrap();
        (bitmap.count(), stats)
    }

    #[test]
    fn reference_fixture() {
        let input = "1.2.3.4\n1.2.3.4\n255.255.255.255\n0.0.0.0\n999.1.1.1\n1.2.3\n";
        let (distinct, stats) = scan(input);
        assert_eq!(distinct, 3);
        assert_eq!(stats.lines, 6);
        assert_eq!(stats.malformed, 2);
    }

    #[test]
    fn whitespace_and_crlf_are_trimmed() {
        let (distinct, stats) = scan("  10.0.0.1\t\r\n10.0.0.1\r\n\t10.0.0.2   \n");
        assert_eq!(distinct, 2);
        assert_eq!(stats.malformed, 0);
    }

    #[test]
    fn unterminated_last_line_is_counted() {
        let (distinct, stats) = scan("1.1.1.1\n2.2.2.2");
        assert_eq!(distinct, 2);
        assert_eq!(stats.lines, 2);
    }

    #[test]
    fn empty_input_counts_zero() {
        let (distinct, stats) = scan("");
        assert_eq!(distinct, 0);
        assert_eq!(stats.lines, 0);
    }

    #[test]
    fn non_utf8_line_is_malformed_not_fatal() {
        let mut bitmap = PresenceBitmap::new();
        let input: &[u8] = b"1.1.1.1\n\xff\xfe.1.1.1\n3.3.3.3\n";
        let stats = scan_lines(Cursor::new(input), &mut bitmap).unwrap();
        assert_eq!(bitmap.count(), 2);
        assert_eq!(stats.malformed, 1);
    }
}
