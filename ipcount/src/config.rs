use crate::error::{CountError, Result};
use std::fmt;
use std::str::FromStr;
use std::thread;

/// Default window size: 1 GiB of file per mapped window.
pub const DEFAULT_WINDOW_SIZE: u64 = 1 << 30;
/// Default addresses per forwarded batch.
pub const DEFAULT_BATCH_SIZE: usize = 64 * 1024;
/// Default depth of the window-index and batch queues.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;
/// Bytes mapped past a window's nominal end: the longest literal plus `\n`.
pub const OVERLAP_BYTES: u64 = 16;

/// Which scanner runs a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Single-threaded line-by-line scan.
    #[default]
    Sequential,
    /// Memory-mapped windows scanned by a worker pool.
    Parallel,
}

/// How the parallel scanner gets decoded addresses into the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Workers send batches to a single consumer that owns the bitmap.
    #[default]
    Channel,
    /// Workers OR bits into a shared atomic bitmap directly.
    Shared,
}

/// Tuning for a count operation. The sequential scanner ignores all of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountConfig {
    pub window_size: u64,
    pub worker_count: usize,
    pub batch_size: usize,
    pub queue_depth: usize,
    pub overlap_bytes: u64,
    pub aggregation: Aggregation,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            worker_count: default_worker_count(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            overlap_bytes: OVERLAP_BYTES,
            aggregation: Aggregation::default(),
        }
    }
}

impl CountConfig {
    /// Rejects settings the parallel scanner cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(CountError::InvalidConfig("window_size must be > 0"));
        }
        if self.worker_count == 0 {
            return Err(CountError::InvalidConfig("worker_count must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(CountError::InvalidConfig("batch_size must be > 0"));
        }
        if self.queue_depth == 0 {
            return Err(CountError::InvalidConfig("queue_depth must be > 0"));
        }
        if self.overlap_bytes == 0 {
            return Err(CountError::InvalidConfig("overlap_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Number of CPUs the process may use, falling back to 1.
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "seq" | "sequential" => Ok(Self::Sequential),
            "parallel" | "par" => Ok(Self::Parallel),
            other => Err(format!("unknown mode: {other} (expected seq or parallel)")),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("seq"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "channel" => Ok(Self::Channel),
            "shared" => Ok(Self::Shared),
            other => Err(format!(
                "unknown aggregation: {other} (expected channel or shared)"
            )),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => f.write_str("channel"),
            Self::Shared => f.write_str("shared"),
        }
    }
}
