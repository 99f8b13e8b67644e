//! Exact distinct-IPv4 counting over large text files
//!
//! This crate provides:
//! - `codec`: dotted-decimal address decoding
//! - `bitmap`: fixed 2^32-bit presence bitmaps (single-writer and atomic)
//! - `sequential`: single-threaded line scanner
//! - `window` / `parallel`: memory-mapped window scanner with a worker pool
//! - `aggregator`: single consumer that applies worker batches to the bitmap

pub mod aggregator;
pub mod bitmap;
pub mod codec;
pub mod config;
pub mod error;
pub mod parallel;
pub mod sequential;
pub mod window;

#[cfg(any(kani, test))]
#[path = "kani_proofs.rs"]
mod kani_proofs;

use std::ops::AddAssign;
use std::path::Path;

pub use config::{Aggregation, CountConfig, Strategy};
pub use error::{CountError, Result};
pub use parallel::ParallelCounter;
pub use sequential::SequentialCounter;

/// Per-scan line totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines examined, malformed ones included.
    pub lines: u64,
    /// Lines that failed to decode and were skipped.
    pub malformed: u64,
}

impl AddAssign for ScanStats {
    fn add_assign(&mut self, rhs: Self) {
        self.lines += rhs.lines;
        self.malformed += rhs.malformed;
    }
}

/// Result of one count operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReport {
    pub distinct: u64,
    pub stats: ScanStats,
}

/// A strategy that counts distinct valid addresses in a file.
pub trait DistinctCounter {
    fn report(&self, path: &Path) -> Result<CountReport>;

    fn count(&self, path: &Path) -> Result<u64> {
        self.report(path).map(|report| report.distinct)
    }
}

impl Strategy {
    /// Builds the counter for this strategy.
    pub fn counter(self, config: &CountConfig) -> Box<dyn DistinctCounter + Send + Sync> {
        match self {
            Strategy::Sequential => Box::new(SequentialCounter::new()),
            Strategy::Parallel => Box::new(ParallelCounter::new(config.clone())),
        }
    }
}

/// Counts the distinct valid IPv4 addresses in the file at `path`.
///
/// Malformed lines are skipped. On error no count is returned.
///
/// # Examples
///
/// ```no_run
/// use ipcount::{count_distinct_addresses, CountConfig, Strategy};
///
/// let n = count_distinct_addresses("ips.txt", Strategy::Parallel, &CountConfig::default())?;
/// println!("{n} unique addresses");
/// # Ok::<(), ipcount::CountError>(())
/// ```
pub fn count_distinct_addresses(
    path: impl AsRef<Path>,
    strategy: Strategy,
    config: &CountConfig,
) -> Result<u64> {
    strategy.counter(config).count(path.as_ref())
}
