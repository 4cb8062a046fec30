/// Per-worker directory walker.
///
/// Holds two FIFOs of pending tasks (size tasks ahead of explore tasks) and
/// runs at most `max_open` of them at a time on a small rayon pool, so the
/// owning worker's message loop never blocks on the filesystem. Finished
/// tasks come back as [`TaskOutcome`]s on a crossbeam channel that the worker
/// selects on alongside its inbox. A task that panics comes back as
/// [`TaskOutcome::Failed`].
///
/// The walker only knows about its own queue; whether the scan as a whole is
/// finished is decided by the coordinator.
use super::worker::panic_message;
use crate::config::WorkerScanOptions;
use crate::protocol::{ResultEntry, SizeResult};
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Task {
    Explore(PathBuf),
    Size(PathBuf),
}

#[derive(Debug)]
pub(crate) enum TaskOutcome {
    /// Children of one directory. Empty when the directory could not be read.
    Explored(Vec<ResultEntry>),
    Sized(SizeResult),
    /// A task panicked on the I/O pool. Fatal for the worker.
    Failed(String),
}

/// Reading a directory with this name panics. Lets tests exercise crash
/// handling with a real panic on the I/O pool.
#[cfg(test)]
pub(crate) const PANICKING_DIR: &str = "dirsweep-panicking-dir";

pub(crate) struct Walker {
    options: Arc<WorkerScanOptions>,
    sizes: VecDeque<PathBuf>,
    explores: VecDeque<PathBuf>,
    open: usize,
    max_open: usize,
    stopped: bool,
    io: rayon::ThreadPool,
    outcome_tx: Sender<TaskOutcome>,
}

impl Walker {
    pub(crate) fn new(
        worker_id: usize,
        io_threads: usize,
        max_open: usize,
        outcome_tx: Sender<TaskOutcome>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        // Without a handler rayon aborts the process when a task panics.
        let panic_tx = outcome_tx.clone();
        let io = rayon::ThreadPoolBuilder::new()
            .num_threads(io_threads.max(1))
            .thread_name(move |i| format!("dirsweep-io-{worker_id}-{i}"))
            .panic_handler(move |payload| {
                let _ = panic_tx.send(TaskOutcome::Failed(panic_message(payload.as_ref())));
            })
            .build()?;

        Ok(Self {
            options: Arc::new(WorkerScanOptions::new("", Default::default())),
            sizes: VecDeque::new(),
            explores: VecDeque::new(),
            open: 0,
            max_open: max_open.max(1),
            stopped: false,
            io,
            outcome_tx,
        })
    }

    pub(crate) fn set_options(&mut self, options: WorkerScanOptions) {
        self.options = Arc::new(options);
    }

    /// Queue a task and start as many queued tasks as the bound allows.
    /// Size tasks go ahead of explore tasks, since a user is usually waiting
    /// on them, but keep their own arrival order.
    pub(crate) fn enqueue(&mut self, task: Task) {
        if self.stopped {
            return;
        }
        match task {
            Task::Size(path) => self.sizes.push_back(path),
            Task::Explore(path) => self.explores.push_back(path),
        }
        self.drain();
    }

    /// Called by the owner for every outcome it receives.
    pub(crate) fn complete(&mut self) {
        self.open = self.open.saturating_sub(1);
        self.drain();
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
        self.sizes.clear();
        self.explores.clear();
    }

    /// Tasks queued or in flight.
    pub(crate) fn pending_jobs(&self) -> usize {
        self.sizes.len() + self.explores.len() + self.open
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        self.pending_jobs() == 0
    }

    #[cfg(test)]
    pub(crate) fn open(&self) -> usize {
        self.open
    }

    fn drain(&mut self) {
        while self.open < self.max_open && !self.stopped {
            let task = match self.sizes.pop_front() {
                Some(path) => Task::Size(path),
                None => match self.explores.pop_front() {
                    Some(path) => Task::Explore(path),
                    None => break,
                },
            };
            self.open += 1;

            let options = Arc::clone(&self.options);
            let tx = self.outcome_tx.clone();
            self.io.spawn(move || {
                let outcome = match task {
                    Task::Explore(path) => TaskOutcome::Explored(read_children(&path, &options)),
                    Task::Size(path) => {
                        let size = folder_size(&path);
                        TaskOutcome::Sized(SizeResult { path, size })
                    }
                };
                // The worker may already be gone after a stop.
                let _ = tx.send(outcome);
            });
        }
    }
}

/// Read one directory and classify its child directories.
///
/// Files, symlinks and excluded paths are dropped. Any failure to open the
/// directory yields an empty batch: vanished or unreadable directories are
/// normal in a crawl. Entries that fail mid-read are skipped.
pub(crate) fn read_children(dir: &Path, options: &WorkerScanOptions) -> Vec<ResultEntry> {
    #[cfg(test)]
    if dir.ends_with(PANICKING_DIR) {
        panic!("simulated failure reading {}", dir.display());
    }

    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };

    read_dir
        .filter_map(Result::ok)
        .filter_map(|entry| {
            // `DirEntry::file_type` does not follow symlinks.
            let file_type = entry.file_type().ok()?;
            if !file_type.is_dir() {
                return None;
            }
            let path = entry.path();
            if options.is_excluded(&path) {
                return None;
            }
            let is_target = options.is_target(&entry.file_name().to_string_lossy());
            Some(ResultEntry { path, is_target })
        })
        .collect()
}

/// Total allocated bytes of everything below `root`.
///
/// Symlinks are neither followed nor counted and unreadable entries are
/// skipped, so an unreadable root reports 0.
pub(crate) fn folder_size(root: &Path) -> u64 {
    jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(false)
        // Already on an I/O thread; a nested rayon pool would only add contention.
        .parallelism(jwalk::Parallelism::Serial)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth > 0 && !entry.file_type().is_symlink())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| disk_usage(&meta))
        .sum()
}

/// Actual disk usage (accounts for sparse files and block size).
#[cfg(unix)]
fn disk_usage(metadata: &fs::Metadata) -> u64 {
    // st_blocks is in 512-byte units
    metadata.blocks() * 512
}

#[cfg(not(unix))]
fn disk_usage(metadata: &fs::Metadata) -> u64 {
    metadata.len()
}
