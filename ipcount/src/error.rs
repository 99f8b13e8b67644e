use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of a count operation.
///
/// Malformed lines are not represented here: they are skipped inside the
/// scanners and never surface to the caller.
#[derive(Error, Debug)]
pub enum CountError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat {path:?}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error: {0}")]
    Read(#[from] io::Error),

    #[error("failed to map window {window} (bytes {start}..{end}): {source}")]
    Map {
        window: u64,
        start: u64,
        end: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("worker thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, CountError>;
