/// Error types surfaced by the scan pool and the deletion manager.
///
/// Expected filesystem noise (unreadable or vanished directories during a
/// crawl) never reaches these types; it is absorbed inside the walker.
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the scanning / sizing pipeline.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A size query received no result before its deadline.
    #[error("timeout calculating size for {} ({timeout:?})", path.display())]
    SizeTimeout { path: PathBuf, timeout: Duration },

    /// The pool was torn down while this size query was still outstanding.
    #[error("workers terminated before completion of {}", path.display())]
    Terminated { path: PathBuf },

    /// A worker thread failed. Fatal to the running scan.
    #[error("worker {worker_id} failed: {message}")]
    WorkerFailed { worker_id: usize, message: String },

    /// The OS refused to start a worker or the coordinator thread.
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },

    /// The scan pool is no longer running (it was dropped).
    #[error("scan pool is shut down")]
    PoolClosed,

    /// The requested root cannot be scanned.
    #[error("invalid root folder {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: &'static str },
}

/// Failures of the deletion chain.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("no deletion strategy available on this system")]
    NoStrategyAvailable,

    /// The selected strategy ran and failed. The name is kept for diagnosis.
    #[error("deletion failed using {strategy} strategy: {source}")]
    StrategyFailed {
        strategy: String,
        #[source]
        source: io::Error,
    },
}
