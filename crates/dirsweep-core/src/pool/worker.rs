/// Worker transport: one OS thread hosting one [`Walker`].
///
/// The coordinator talks to a worker only through its inbox and the pool's
/// shared uplink. Nothing else is shared; the walker's queue lives entirely
/// on the worker thread.
use super::walker::{Task, TaskOutcome, Walker};
use crate::config::PoolConfig;
use crate::error::ScanError;
use crate::protocol::WorkerMessage;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, error};

/// Coordinator-side handle to a worker thread.
pub(crate) struct WorkerLink {
    pub(crate) id: usize,
    inbox: Sender<WorkerMessage>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl WorkerLink {
    /// Spawn the worker thread and post `Startup` to it.
    pub(crate) fn spawn(
        id: usize,
        uplink: Sender<WorkerMessage>,
        config: &PoolConfig,
    ) -> Result<Self, ScanError> {
        let (inbox, inbox_rx) = unbounded();
        let io_threads = config.io_threads_per_worker;
        let max_open = config.max_open_dirs;

        let thread = thread::Builder::new()
            .name(format!("dirsweep-worker-{id}"))
            .spawn(move || run_worker(id, inbox_rx, uplink, io_threads, max_open))
            .map_err(|source| ScanError::Spawn {
                what: format!("worker {id}"),
                source,
            })?;

        let link = Self {
            id,
            inbox,
            _thread: Some(thread),
        };
        link.post(WorkerMessage::Startup { id })?;
        Ok(link)
    }

    /// A link with no thread behind it; the test holds the inbox receiver.
    #[cfg(test)]
    pub(crate) fn detached(id: usize) -> (Self, Receiver<WorkerMessage>) {
        let (inbox, inbox_rx) = unbounded();
        (
            Self {
                id,
                inbox,
                _thread: None,
            },
            inbox_rx,
        )
    }

    pub(crate) fn post(&self, message: WorkerMessage) -> Result<(), ScanError> {
        self.inbox
            .send(message)
            .map_err(|err| ScanError::WorkerFailed {
                worker_id: self.id,
                message: format!("inbox closed while posting {}", err.0.tag()),
            })
    }
}

/// Thread entry point. A panic anywhere in the worker, including one in a
/// walker task, is reported upstream as an `Error` message instead of
/// disappearing with the thread.
fn run_worker(
    id: usize,
    inbox: Receiver<WorkerMessage>,
    uplink: Sender<WorkerMessage>,
    io_threads: usize,
    max_open: usize,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        worker_loop(id, &inbox, &uplink, io_threads, max_open)
    }));

    let failure = match result {
        Ok(Ok(())) => None,
        Ok(Err(message)) => Some(message),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    if let Some(message) = failure {
        error!("Worker {id} failed: {message}");
        let _ = uplink.send(WorkerMessage::Error {
            worker_id: id,
            message,
        });
    }
    debug!("Worker {id} exited");
}

fn worker_loop(
    mut id: usize,
    inbox: &Receiver<WorkerMessage>,
    uplink: &Sender<WorkerMessage>,
    io_threads: usize,
    max_open: usize,
) -> Result<(), String> {
    let (outcome_tx, outcome_rx) = unbounded::<TaskOutcome>();
    let mut walker = Walker::new(id, io_threads, max_open, outcome_tx)
        .map_err(|err| format!("cannot build I/O pool: {err}"))?;

    loop {
        select! {
            recv(inbox) -> message => {
                // Inbox closed: the pool was torn down.
                let Ok(message) = message else { break };
                match message {
                    WorkerMessage::Startup { id: assigned } => {
                        id = assigned;
                        if uplink.send(WorkerMessage::Alive).is_err() {
                            break;
                        }
                    }
                    WorkerMessage::ExploreConfig(options) => walker.set_options(options),
                    WorkerMessage::Explore { path } => walker.enqueue(Task::Explore(path)),
                    WorkerMessage::GetSize { path } => walker.enqueue(Task::Size(path)),
                    WorkerMessage::Stop => {
                        walker.stop();
                        break;
                    }
                    other => debug!("Worker {id} ignoring {} message", other.tag()),
                }
            }
            recv(outcome_rx) -> outcome => {
                // The walker holds a sender, so this channel never disconnects here.
                let Ok(outcome) = outcome else { break };
                walker.complete();
                let pending = walker.pending_jobs();
                let reply = match outcome {
                    TaskOutcome::Explored(results) => WorkerMessage::ScanResult {
                        results,
                        worker_id: id,
                        pending,
                    },
                    TaskOutcome::Sized(result) => WorkerMessage::GetSizeResult {
                        results: result,
                        worker_id: id,
                        pending,
                    },
                    TaskOutcome::Failed(message) => return Err(message),
                };
                if uplink.send(reply).is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
