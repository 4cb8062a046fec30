/// Shared scan counters.
///
/// The coordinator thread is the only writer of the search and size
/// counters; frontends take a read lock (or a [`ScanStatus`] snapshot) to
/// render progress.
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// A shared, concurrently-readable status object.
pub type SharedStatus = Arc<RwLock<ScanStatus>>;

/// Lifecycle of the worker pool as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    #[default]
    Stopped,
    Scanning,
    Dead,
    Finished,
}

/// Progress counters for the current scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    /// Jobs dispatched to workers and not yet acknowledged.
    pub pending_search_tasks: u64,
    /// Jobs acknowledged by workers.
    pub completed_search_tasks: u64,
    /// Size queries still waiting for an answer.
    pub pending_stats_calculation: u64,
    pub completed_stats_calculation: u64,
    pub results_found: u64,
    pub pending_deletions: u64,
    pub worker_status: WorkerStatus,
    /// Last queue depth each worker reported (diagnostic only).
    pub workers_jobs: Vec<usize>,
}

impl ScanStatus {
    pub fn shared() -> SharedStatus {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn new_result(&mut self) {
        self.results_found += 1;
    }

    pub fn new_stat_calculation(&mut self) {
        self.pending_stats_calculation += 1;
    }

    pub fn complete_stat_calculation(&mut self) {
        self.pending_stats_calculation = self.pending_stats_calculation.saturating_sub(1);
        self.completed_stats_calculation += 1;
    }

    /// A size query left the pending set without producing a value.
    pub fn abandon_stat_calculation(&mut self) {
        self.pending_stats_calculation = self.pending_stats_calculation.saturating_sub(1);
    }

    /// Clear counters for a new scan. Worker status is left alone.
    pub fn reset(&mut self) {
        let worker_status = self.worker_status;
        *self = Self {
            worker_status,
            ..Self::default()
        };
    }
}
