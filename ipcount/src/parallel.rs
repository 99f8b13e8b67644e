//! Parallel window scanner.
//!
//! A feeder thread pushes window indices into a bounded queue; a fixed pool
//! of workers claims indices, maps each window, decodes the lines it owns and
//! forwards batches. The calling thread runs the aggregator until every
//! worker has hung up.

use crate::aggregator::{Aggregator, Batch, CancelFlag, Target};
use crate::bitmap::{AtomicPresenceBitmap, PresenceBitmap};
use crate::codec;
use crate::config::{Aggregation, CountConfig};
use crate::error::{CountError, Result};
use crate::window::{MappedWindow, WindowPlan};
use crate::{CountReport, DistinctCounter, ScanStats};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::fs::File;
use std::mem;
use std::path::Path;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ParallelCounter {
    config: CountConfig,
}

impl ParallelCounter {
    pub fn new(config: CountConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CountConfig {
        &self.config
    }
}

impl DistinctCounter for ParallelCounter {
    fn report(&self, path: &Path) -> Result<CountReport> {
        self.config.validate()?;
        let start = Instant::now();

        let file = File::open(path).map_err(|source| CountError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let file_size = file
            .metadata()
            .map_err(|source| CountError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let cfg = &self.config;
        let plan = WindowPlan::new(file_size, cfg.window_size, cfg.overlap_bytes);
        info!(
            ?path,
            file_size,
            windows = plan.num_windows(),
            workers = cfg.worker_count,
            aggregation = %cfg.aggregation,
            "starting parallel scan"
        );

        let (distinct, stats) = match cfg.aggregation {
            Aggregation::Channel => {
                let mut bitmap = PresenceBitmap::new();
                let stats = run_pool(&file, &plan, cfg, Target::Exclusive(&mut bitmap))?;
                (bitmap.count(), stats)
            }
            Aggregation::Shared => {
                let bitmap = AtomicPresenceBitmap::new();
                let stats = run_pool(&file, &plan, cfg, Target::Shared(&bitmap))?;
                (bitmap.count(), stats)
            }
        };

        info!(
            lines = stats.lines,
            malformed = stats.malformed,
            distinct,
            elapsed = ?start.elapsed(),
            "parallel scan complete"
        );
        Ok(CountReport { distinct, stats })
    }
}

/// Runs feeder, workers and aggregator to completion.
fn run_pool(
    file: &File,
    plan: &WindowPlan,
    cfg: &CountConfig,
    target: Target<'_>,
) -> Result<ScanStats> {
    let shared = match &target {
        Target::Shared(bitmap) => Some(*bitmap),
        Target::Exclusive(_) => None,
    };
    let (index_tx, index_rx) = bounded::<u64>(cfg.queue_depth);
    let (batch_tx, batch_rx) = bounded::<Batch>(cfg.queue_depth);
    let (err_tx, err_rx) = unbounded::<CountError>();
    let cancel = CancelFlag::new();
    let num_windows = plan.num_windows();

    thread::scope(|s| -> Result<ScanStats> {
        let mut handles = Vec::with_capacity(cfg.worker_count);
        for id in 0..cfg.worker_count {
            let worker = Worker {
                id,
                file,
                plan,
                batch_size: cfg.batch_size,
                indices: index_rx.clone(),
                errors: err_tx.clone(),
                sink: match shared {
                    Some(bitmap) => Sink::Shared(bitmap),
                    None => Sink::Channel(batch_tx.clone()),
                },
                cancel: &cancel,
            };
            let handle = thread::Builder::new()
                .name(format!("ipcount-worker-{id}"))
                .spawn_scoped(s, move || worker.run())
                .map_err(CountError::Spawn)?;
            handles.push(handle);
        }
        // Channels disconnect once the workers, not this thread, are done.
        drop(index_rx);
        drop(batch_tx);
        drop(err_tx);

        let cancel = &cancel;
        thread::Builder::new()
            .name("ipcount-feeder".to_string())
            .spawn_scoped(s, move || feed(index_tx, num_windows, cancel))
            .map_err(CountError::Spawn)?;

        let outcome = Aggregator::new(target).drain(batch_rx, err_rx, cancel);

        let mut stats = ScanStats::default();
        let mut panicked = false;
        for handle in handles {
            match handle.join() {
                Ok(worker_stats) => stats += worker_stats,
                Err(_) => panicked = true,
            }
        }

        outcome?;
        if panicked {
            return Err(CountError::WorkerPanicked);
        }
        Ok(stats)
    })
}

/// Enqueues every window index, stopping early on cancellation. Dropping
/// the sender closes the queue.
fn feed(indices: Sender<u64>, num_windows: u64, cancel: &CancelFlag) {
    for index in 0..num_windows {
        if cancel.is_cancelled() || indices.send(index).is_err() {
            debug!(index, "feeder stopped early");
            return;
        }
    }
}

/// Where a worker puts full batches.
enum Sink<'b> {
    Channel(Sender<Batch>),
    Shared(&'b AtomicPresenceBitmap),
}

impl Sink<'_> {
    /// Hands off `batch` and leaves it empty. Returns false once nobody is
    /// listening any more.
    fn flush(&self, batch: &mut Batch) -> bool {
        match self {
            Sink::Channel(tx) => {
                let full = mem::replace(batch, Vec::with_capacity(batch.capacity()));
                tx.send(full).is_ok()
            }
            Sink::Shared(bitmap) => {
                bitmap.set_all(batch);
                batch.clear();
                true
            }
        }
    }
}

struct Worker<'a> {
    id: usize,
    file: &'a File,
    plan: &'a WindowPlan,
    batch_size: usize,
    indices: Receiver<u64>,
    errors: Sender<CountError>,
    sink: Sink<'a>,
    cancel: &'a CancelFlag,
}

impl Worker<'_> {
    fn run(self) -> ScanStats {
        let mut stats = ScanStats::default();
        let mut batch = Batch::with_capacity(self.batch_size);

        for index in self.indices.iter() {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.scan_window(index, &mut batch) {
                Ok(window_stats) => stats += window_stats,
                Err(err) => {
                    self.cancel.cancel();
                    let _ = self.errors.send(err);
                    break;
                }
            }
        }

        debug!(
            worker = self.id,
            lines = stats.lines,
            malformed = stats.malformed,
            "worker finished"
        );
        stats
    }

    /// Maps window `index`, decodes the lines it owns and flushes them.
    ///
    /// The mapping is widened (overlap doubled) until the last owned line is
    /// fully visible or the mapping reaches end of file. It is unmapped when
    /// this returns, on every path.
    fn scan_window(&self, index: u64, batch: &mut Batch) -> Result<ScanStats> {
        let mut overlap = self.plan.overlap().max(1);

        loop {
            let window = self.plan.window_with_overlap(index, overlap);
            let mapped = MappedWindow::map(self.file, window)?;
            let Some(lines) = mapped.owned_lines() else {
                debug!(
                    worker = self.id,
                    window = index,
                    overlap,
                    "owned tail line runs past the overlap, widening mapping"
                );
                overlap = overlap.saturating_mul(2);
                continue;
            };

            let mut stats = ScanStats::default();
            for line in lines {
                stats.lines += 1;
                let text = line.trim_ascii();
                match codec::decode(text) {
                    Ok(addr) => {
                        batch.push(addr);
                        if batch.len() >= self.batch_size
                            && (!self.sink.flush(batch) || self.cancel.is_cancelled())
                        {
                            return Ok(stats);
                        }
                    }
                    Err(reason) => {
                        stats.malformed += 1;
                        warn!(
                            window = index,
                            text = %String::from_utf8_lossy(text),
                            %reason,
                            "skipping malformed address"
                        );
                    }
                }
            }
            if !batch.is_empty() {
                self.sink.flush(batch);
            }

            debug!(
                worker = self.id,
                window = index,
                start = window.start,
                mapped_len = window.mapped_len,
                lines = stats.lines,
                "window done"
            );
            return Ok(stats);
        }
    }
}
