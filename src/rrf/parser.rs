use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use memmap2::Mmap;
use rayon::prelude::*;

use crate::errors::ParseError;

/// Result of a parallel, chunked parse of one RRF file.
pub struct ParseOutcome<T> {
    pub records: Vec<T>,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
}

/// Parses `path` by partitioning it into `workers` byte ranges, rounding each
/// range forward to the next line boundary so no row is split across workers,
/// and running `parse_line` over every complete line in each range concurrently.
///
/// `parse_line` returns `None` for a row that should be filtered out (e.g. it
/// failed a SAB allowlist or suppression check) and `Some(Err(..))` for a row
/// that is malformed. A malformed-row count above `malformed_threshold` aborts
/// the parse with `ParseError::ThresholdExceeded`.
pub fn parse_file_parallel<T, F>(
    path: &Path,
    workers: usize,
    malformed_threshold: usize,
    parse_line: F,
) -> Result<ParseOutcome<T>, ParseError>
where
    T: Send,
    F: Fn(&str) -> LineOutcome<T> + Sync,
{
    let file = File::open(path)?;
    // SAFETY: the mapped file is read-only for the lifetime of this call and is
    // not expected to be mutated concurrently by another process.
    let mmap = unsafe { Mmap::map(&file)? };
    let bytes = &mmap[..];

    let ranges = line_aligned_ranges(bytes, workers.max(1));
    let skipped = AtomicUsize::new(0);
    let parsed = AtomicUsize::new(0);

    let chunk_results: Result<Vec<Vec<T>>, ParseError> = ranges
        .par_iter()
        .map(|&(start, end)| {
            let mut local = Vec::new();
            for line in bytes[start..end].split(|&b| b == b'\n') {
                if line.is_empty() {
                    continue;
                }
                let line = strip_trailing_cr(line);
                let line = match std::str::from_utf8(line) {
                    Ok(s) => s,
                    Err(_) => {
                        record_skip(&skipped, malformed_threshold, path)?;
                        continue;
                    }
                };

                match parse_line(line) {
                    LineOutcome::Kept(record) => {
                        parsed.fetch_add(1, Ordering::Relaxed);
                        local.push(record);
                    }
                    LineOutcome::Filtered => {
                        parsed.fetch_add(1, Ordering::Relaxed);
                    }
                    LineOutcome::Malformed => {
                        record_skip(&skipped, malformed_threshold, path)?;
                    }
                }
            }
            Ok(local)
        })
        .collect();

    let records = chunk_results?.into_iter().flatten().collect();

    Ok(ParseOutcome {
        records,
        rows_parsed: parsed.load(Ordering::Relaxed),
        rows_skipped: skipped.load(Ordering::Relaxed),
    })
}

/// What a per-line parse closure decided about a row.
pub enum LineOutcome<T> {
    /// The row parsed and passed all filters; keep it.
    Kept(T),
    /// The row parsed but was dropped by a filter (SAB allowlist, suppression, self-loop).
    Filtered,
    /// The row did not have the minimum number of fields.
    Malformed,
}

fn record_skip(skipped: &AtomicUsize, threshold: usize, path: &Path) -> Result<(), ParseError> {
    let count = skipped.fetch_add(1, Ordering::Relaxed) + 1;
    if count > threshold {
        return Err(ParseError::ThresholdExceeded {
            file: path.display().to_string(),
            count,
            threshold,
        });
    }
    Ok(())
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Divides `bytes` into `workers` ranges whose boundaries fall immediately after
/// a `\n`, so each worker only ever sees whole lines. The final range always
/// extends to the end of the buffer.
fn line_aligned_ranges(bytes: &[u8], workers: usize) -> Vec<(usize, usize)> {
    if bytes.is_empty() {
        return vec![(0, 0)];
    }

    let len = bytes.len();
    let chunk_size = len.div_ceil(workers).max(1);
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0usize;

    while start < len {
        let tentative_end = (start + chunk_size).min(len);
        let end = if tentative_end >= len {
            len
        }
        else {
            match memchr::memchr(b'\n', &bytes[tentative_end..]) {
                Some(offset) => tentative_end + offset + 1,
                None => len,
            }
        };

        ranges.push((start, end));
        start = end;
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_the_whole_buffer_without_overlap() {
        let bytes = b"one\ntwo\nthree\nfour\nfive\n";
        let ranges = line_aligned_ranges(bytes, 3);

        assert_eq!(ranges.first().unwrap().0, 0);
        assert_eq!(ranges.last().unwrap().1, bytes.len());
        for window in ranges.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
    }

    #[test]
    fn ranges_never_split_a_line() {
        let bytes = b"aaaa\nbbbb\ncccc\ndddd\n";
        for workers in 1..=8 {
            let ranges = line_aligned_ranges(bytes, workers);
            for &(start, end) in &ranges {
                if start == end {
                    continue;
                }
                assert!(end == bytes.len() || bytes[end - 1] == b'\n');
            }
        }
    }

    #[test]
    fn parses_small_file_deterministically_regardless_of_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRSTY.RRF");
        std::fs::write(&path, "C0000139|T121|...|...|AT1|0|\nC0000139|T116|...|...|AT2|0|\n").unwrap();

        for workers in [1, 2, 4] {
            let outcome = parse_file_parallel(&path, workers, 10, |line| {
                match crate::rrf::record::MrstyRow::parse(line) {
                    Some(row) => LineOutcome::Kept(row.tui),
                    None => LineOutcome::Malformed,
                }
            })
            .unwrap();

            let mut tuis = outcome.records;
            tuis.sort();
            assert_eq!(tuis, vec!["T116".to_string(), "T121".to_string()]);
        }
    }

    #[test]
    fn malformed_rows_above_threshold_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRSTY.RRF");
        std::fs::write(&path, "bad\nbad\nbad\n").unwrap();

        let result = parse_file_parallel(&path, 1, 1, |line| match crate::rrf::record::MrstyRow::parse(line) {
            Some(row) => LineOutcome::Kept(row.tui),
            None => LineOutcome::Malformed,
        });

        assert!(matches!(result, Err(ParseError::ThresholdExceeded { .. })));
    }
}
