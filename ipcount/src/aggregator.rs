//! Single consumer of worker output.
//!
//! Workers push batches of decoded addresses and report fatal errors on a
//! separate channel. The aggregator applies every batch it receives and
//! remembers the first error. After an error it keeps draining, so no
//! producer stays blocked on a full queue, and raises the cancel flag so no
//! further windows are claimed.

use crate::bitmap::{AtomicPresenceBitmap, PresenceBitmap};
use crate::error::{CountError, Result};
use crossbeam_channel::{never, select, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// A group of decoded addresses; order carries no meaning.
pub type Batch = Vec<u32>;

/// Set once the operation has failed. Workers poll it between windows and
/// between batches.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where aggregated batches land.
pub enum Target<'b> {
    /// The aggregator is the only writer.
    Exclusive(&'b mut PresenceBitmap),
    /// Workers write directly; batches arriving here are still applied.
    Shared(&'b AtomicPresenceBitmap),
}

impl Target<'_> {
    fn apply(&mut self, batch: &[u32]) {
        match self {
            Target::Exclusive(bitmap) => bitmap.set_all(batch),
            Target::Shared(bitmap) => bitmap.set_all(batch),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub batches: u64,
    pub addresses: u64,
    pub errors: u64,
}

pub struct Aggregator<'b> {
    target: Target<'b>,
    stats: AggregateStats,
    first_error: Option<CountError>,
}

impl<'b> Aggregator<'b> {
    pub fn new(target: Target<'b>) -> Self {
        Self {
            target,
            stats: AggregateStats::default(),
            first_error: None,
        }
    }

    /// Runs until every producer has hung up on both channels.
    ///
    /// Returns the first reported error, if any; otherwise the totals.
    pub fn drain(
        mut self,
        batches: Receiver<Batch>,
        errors: Receiver<CountError>,
        cancel: &CancelFlag,
    ) -> Result<AggregateStats> {
        let mut batches = batches;
        let mut errors = errors;
        let mut batches_open = true;
        let mut errors_open = true;

        while batches_open || errors_open {
            select! {
                recv(batches) -> msg => match msg {
                    Ok(batch) => self.apply(&batch),
                    Err(_) => {
                        batches = never();
                        batches_open = false;
                    }
                },
                recv(errors) -> msg => match msg {
                    Ok(err) => self.fail(err, cancel),
                    Err(_) => {
                        errors = never();
                        errors_open = false;
                    }
                },
            }
        }

        debug!(
            batches = self.stats.batches,
            addresses = self.stats.addresses,
            errors = self.stats.errors,
            "aggregation finished"
        );
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.stats),
        }
    }

    fn apply(&mut self, batch: &[u32]) {
        self.target.apply(batch);
        self.stats.batches += 1;
        self.stats.addresses += batch.len() as u64;
    }

    fn fail(&mut self, err: CountError, cancel: &CancelFlag) {
        cancel.cancel();
        self.stats.errors += 1;
        if self.first_error.is_none() {
            error!(%err, "worker failed, cancelling remaining windows");
            self.first_error = Some(err);
        } else {
            debug!(%err, "additional worker error");
        }
    }
}
