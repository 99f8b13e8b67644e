use clap::Parser;
use ipcount::config::{
    default_worker_count, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_DEPTH, DEFAULT_WINDOW_SIZE,
    OVERLAP_BYTES,
};
use ipcount::{Aggregation, CountConfig, Strategy};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Count distinct IPv4 addresses in a text file",
    long_about = None
)]
pub struct Config {
    /// File with one dotted-decimal IPv4 address per line
    pub input: PathBuf,

    /// Processing mode: seq or parallel
    #[arg(short, long, env = "IPCOUNT_MODE", default_value = "seq")]
    pub mode: Strategy,

    /// Bytes of file per memory-mapped window (parallel mode)
    #[arg(long, env = "IPCOUNT_WINDOW_SIZE", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: u64,

    /// Worker threads; defaults to the number of available CPUs (parallel mode)
    #[arg(long, env = "IPCOUNT_WORKERS")]
    pub workers: Option<usize>,

    /// Addresses per batch handed to the aggregator (parallel mode)
    #[arg(long, env = "IPCOUNT_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Depth of the window and batch queues (parallel mode)
    #[arg(long, env = "IPCOUNT_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Bytes mapped past each window's edge (parallel mode)
    #[arg(long, env = "IPCOUNT_OVERLAP", default_value_t = OVERLAP_BYTES, hide = true)]
    pub overlap: u64,

    /// How workers reach the bitmap: channel or shared (parallel mode)
    #[arg(long, env = "IPCOUNT_AGGREGATION", default_value = "channel")]
    pub aggregation: Aggregation,

    /// Hide the progress spinner
    #[arg(long, short)]
    pub quiet: bool,
}

impl Config {
    pub fn count_config(&self) -> CountConfig {
        CountConfig {
            window_size: self.window_size,
            worker_count: self.workers.unwrap_or_else(default_worker_count),
            batch_size: self.batch_size,
            queue_depth: self.queue_depth,
            overlap_bytes: self.overlap,
            aggregation: self.aggregation,
        }
    }
}
