/// Worker pool: fans directory exploration and size queries out to worker
/// threads and folds their answers back into caller-facing streams.
///
/// # Threads
///
/// [`ScanPool`] is a thin handle. All coordination happens on one
/// coordinator thread that owns every piece of bookkeeping: the worker links,
/// per-worker dispatched/acknowledged counters, outstanding size requests and
/// the scan output sender. It multiplexes three sources with
/// `crossbeam_channel::select!`: commands from the handle, messages from the
/// current pool's workers, and the nearest size-query deadline. It never
/// blocks on a worker.
///
/// # Completion
///
/// Every `scanResult` / `getSizeResult` acknowledges exactly one job. When
/// Σ(dispatched − acknowledged) over all workers drops to zero the scan is
/// finished: status becomes `Finished`, the output sender is dropped (which
/// completes the caller's stream) and the workers are torn down.
mod walker;
mod worker;

use crate::config::{PoolConfig, WorkerScanOptions};
use crate::error::ScanError;
use crate::protocol::{Job, JobKind, ResultEntry, SizeResult, WorkerMessage};
use crate::status::{SharedStatus, WorkerStatus};
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use worker::WorkerLink;

/// Items of a scan stream. An `Err` is fatal to the scan.
pub type ScanItem = Result<PathBuf, ScanError>;

/// Single-value stream of a size query.
pub type SizeItem = Result<u64, ScanError>;

/// How long the coordinator sleeps when no deadline is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Number of workers for a new pool.
///
/// One core is left for the caller; hosts with more cores than `max_workers`
/// are capped. Never less than one.
pub fn optimal_worker_count(max_workers: usize) -> usize {
    worker_count_for(num_cpus::get(), max_workers)
}

fn worker_count_for(cores: usize, max_workers: usize) -> usize {
    let workers = if cores > max_workers {
        max_workers
    } else {
        cores.saturating_sub(1)
    };
    workers.max(1)
}

enum PoolCommand {
    StartScan {
        output: Sender<ScanItem>,
        options: WorkerScanOptions,
    },
    GetSize {
        output: Sender<SizeItem>,
        path: PathBuf,
    },
    Stop,
    Shutdown,
}

/// Handle to the coordinator thread.
///
/// Dropping it stops any running scan and joins the coordinator.
pub struct ScanPool {
    commands: Sender<PoolCommand>,
    status: SharedStatus,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScanPool {
    pub fn new(config: PoolConfig, status: SharedStatus) -> Result<Self, ScanError> {
        let (commands, commands_rx) = unbounded();
        let coordinator = Coordinator::new(config, status.clone());

        let thread = thread::Builder::new()
            .name("dirsweep-coordinator".into())
            .spawn(move || coordinator.run(commands_rx))
            .map_err(|source| ScanError::Spawn {
                what: "coordinator".into(),
                source,
            })?;

        Ok(Self {
            commands,
            status,
            thread: Some(thread),
        })
    }

    /// Start scanning; discovered target paths are pushed onto `output`.
    ///
    /// Any previous scan is torn down first. The stream completes (all senders
    /// dropped) when traversal is exhausted or [`ScanPool::stop_scan`] is called.
    pub fn start_scan(&self, output: Sender<ScanItem>, options: WorkerScanOptions) {
        if let Err(err) = self.commands.send(PoolCommand::StartScan { output, options }) {
            if let PoolCommand::StartScan { output, .. } = err.0 {
                let _ = output.send(Err(ScanError::PoolClosed));
            }
        }
    }

    /// Ask for the size of `path`. Exactly one item is sent on `output`.
    pub fn get_folder_size(&self, output: Sender<SizeItem>, path: PathBuf) {
        if let Err(err) = self.commands.send(PoolCommand::GetSize { output, path }) {
            if let PoolCommand::GetSize { output, .. } = err.0 {
                let _ = output.send(Err(ScanError::PoolClosed));
            }
        }
    }

    /// Best-effort, non-blocking stop of the running scan.
    pub fn stop_scan(&self) {
        let _ = self.commands.send(PoolCommand::Stop);
    }

    pub fn status(&self) -> &SharedStatus {
        &self.status
    }
}

impl Drop for ScanPool {
    fn drop(&mut self) {
        let _ = self.commands.send(PoolCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct PendingSizeRequest {
    worker_id: usize,
    path: PathBuf,
    output: Sender<SizeItem>,
    deadline: Instant,
}

/// The workers of one scan generation plus their job accounting.
struct Pool {
    workers: Vec<WorkerLink>,
    uplink: Receiver<WorkerMessage>,
    dispatched: Vec<u64>,
    acknowledged: Vec<u64>,
    /// Queue depth each worker last reported (diagnostic).
    reported: Vec<usize>,
    next: usize,
}

impl Pool {
    fn spawn(count: usize, config: &PoolConfig) -> Result<Self, ScanError> {
        info!("Instantiating {count} workers");
        let (uplink_tx, uplink) = unbounded();
        let workers = (0..count)
            .map(|id| WorkerLink::spawn(id, uplink_tx.clone(), config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_workers(workers, uplink))
    }

    fn with_workers(workers: Vec<WorkerLink>, uplink: Receiver<WorkerMessage>) -> Self {
        let count = workers.len();
        Self {
            workers,
            uplink,
            dispatched: vec![0; count],
            acknowledged: vec![0; count],
            reported: vec![0; count],
            next: 0,
        }
    }

    fn broadcast(&self, message: &WorkerMessage) -> Result<(), ScanError> {
        self.workers
            .iter()
            .try_for_each(|worker| worker.post(message.clone()))
    }

    /// Round-robin: the target index advances on every dispatch regardless of
    /// load, so one deep branch cannot pin all work on one worker.
    fn dispatch(&mut self, job: Job) -> Result<usize, ScanError> {
        let index = self.next;
        self.workers[index].post(job.into_message())?;
        self.dispatched[index] += 1;
        self.next = (self.next + 1) % self.workers.len();
        Ok(index)
    }

    fn acknowledge(&mut self, worker_id: usize, pending: usize) {
        match self.acknowledged.get_mut(worker_id) {
            Some(acked) if *acked < self.dispatched[worker_id] => {
                *acked += 1;
                self.reported[worker_id] = pending;
            }
            _ => warn!("Unexpected acknowledgement from worker {worker_id}"),
        }
    }

    fn pending(&self) -> u64 {
        self.dispatched.iter().sum::<u64>() - self.acknowledged.iter().sum::<u64>()
    }

    fn completed(&self) -> u64 {
        self.acknowledged.iter().sum()
    }
}

/// All coordinator state. Lives on the coordinator thread only.
struct Coordinator {
    config: PoolConfig,
    status: SharedStatus,
    pool: Option<Pool>,
    scan_output: Option<Sender<ScanItem>>,
    size_requests: Vec<PendingSizeRequest>,
    /// `(worker_id, path)` of size jobs that timed out but are still running.
    /// Their late answer consumes the entry and is dropped.
    expired_sizes: Vec<(usize, PathBuf)>,
    stop_requested: bool,
    scan_started: Option<Instant>,
}

impl Coordinator {
    fn new(config: PoolConfig, status: SharedStatus) -> Self {
        Self {
            config,
            status,
            pool: None,
            scan_output: None,
            size_requests: Vec::new(),
            expired_sizes: Vec::new(),
            stop_requested: false,
            scan_started: None,
        }
    }

    fn run(mut self, commands: Receiver<PoolCommand>) {
        loop {
            let uplink = self
                .pool
                .as_ref()
                .map(|pool| pool.uplink.clone())
                .unwrap_or_else(never);
            let wait = self
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT);

            select! {
                recv(commands) -> command => match command {
                    Ok(PoolCommand::StartScan { output, options }) => {
                        self.start_scan(output, options)
                    }
                    Ok(PoolCommand::GetSize { output, path }) => self.get_folder_size(output, path),
                    Ok(PoolCommand::Stop) => self.stop_scan(),
                    Ok(PoolCommand::Shutdown) | Err(_) => {
                        self.stop_scan();
                        break;
                    }
                },
                recv(uplink) -> message => {
                    if let Ok(message) = message {
                        self.handle_message(message);
                    }
                },
                default(wait) => {},
            }

            self.expire_size_requests(Instant::now());
        }
        debug!("Coordinator exited");
    }

    fn start_scan(&mut self, output: Sender<ScanItem>, options: WorkerScanOptions) {
        self.teardown();
        self.stop_requested = false;
        self.status.write().reset();

        if let Err(err) = self.ensure_pool(&options) {
            error!("Cannot start scan: {err}");
            self.status.write().worker_status = WorkerStatus::Dead;
            let _ = output.send(Err(err));
            return;
        }

        info!("Scan started in {}", options.root_path.display());
        self.scan_started = Some(Instant::now());
        self.scan_output = Some(output);
        self.add_job(Job::explore(options.root_path));
        self.update_stats();
    }

    fn get_folder_size(&mut self, output: Sender<SizeItem>, path: PathBuf) {
        if self.pool.is_none() {
            // Size asked outside a full scan: bring up a pool just for it.
            self.stop_requested = false;
            let options = WorkerScanOptions::new(path.clone(), Default::default());
            if let Err(err) = self.ensure_pool(&options) {
                error!("Cannot start pool for size of {}: {err}", path.display());
                let _ = output.send(Err(err));
                return;
            }
        }

        match self.add_job(Job::get_size(path.clone())) {
            Some(worker_id) => {
                self.size_requests.push(PendingSizeRequest {
                    worker_id,
                    path,
                    output,
                    deadline: Instant::now() + self.config.size_timeout,
                });
                self.status.write().new_stat_calculation();
            }
            None => {
                let _ = output.send(Err(ScanError::Terminated { path }));
            }
        }
        self.update_stats();
    }

    fn stop_scan(&mut self) {
        if self.pool.is_some() {
            info!("Stopping scan...");
        }
        self.stop_requested = true;
        self.status.write().worker_status = WorkerStatus::Stopped;
        if let Some(pool) = &self.pool {
            let _ = pool.broadcast(&WorkerMessage::Stop);
        }
        self.teardown();
    }

    fn ensure_pool(&mut self, options: &WorkerScanOptions) -> Result<(), ScanError> {
        let pool = Pool::spawn(optimal_worker_count(self.config.max_workers), &self.config)?;
        pool.broadcast(&WorkerMessage::ExploreConfig(options.clone()))?;
        self.pool = Some(pool);
        Ok(())
    }

    /// Dispatch `job`; returns the worker it went to.
    fn add_job(&mut self, job: Job) -> Option<usize> {
        if self.stop_requested {
            return None;
        }
        let pool = self.pool.as_mut()?;
        let kind = job.kind;
        match pool.dispatch(job) {
            Ok(index) => {
                debug!("Dispatched {kind:?} job to worker {index}");
                Some(index)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::ScanResult {
                results,
                worker_id,
                pending,
            } => {
                if let Some(pool) = self.pool.as_mut() {
                    pool.acknowledge(worker_id, pending);
                }
                self.on_scan_result(results);
                self.check_job_complete();
            }
            WorkerMessage::GetSizeResult {
                results,
                worker_id,
                pending,
            } => {
                if let Some(pool) = self.pool.as_mut() {
                    pool.acknowledge(worker_id, pending);
                }
                self.on_size_result(worker_id, results);
                self.check_job_complete();
            }
            WorkerMessage::Alive => {
                self.status.write().worker_status = WorkerStatus::Scanning;
            }
            WorkerMessage::Error { worker_id, message } => {
                error!("Worker error: {message}");
                self.fail(ScanError::WorkerFailed { worker_id, message });
            }
            other => debug!("Coordinator ignoring {} message", other.tag()),
        }
    }

    fn on_scan_result(&mut self, results: Vec<ResultEntry>) {
        for ResultEntry { path, is_target } in results {
            if is_target {
                self.status.write().new_result();
                if let Some(output) = &self.scan_output {
                    // A dropped receiver just means nobody listens any more.
                    let _ = output.send(Ok(path));
                }
            } else if !self.stop_requested {
                self.add_job(Job::explore(path));
            }
        }
    }

    fn on_size_result(&mut self, worker_id: usize, result: SizeResult) {
        // A worker starts size jobs in dispatch order, so the oldest expired
        // job for this path claims the first answer.
        if let Some(index) = self
            .expired_sizes
            .iter()
            .position(|(id, path)| *id == worker_id && *path == result.path)
        {
            self.expired_sizes.remove(index);
            debug!("Dropping late size result for {}", result.path.display());
            return;
        }

        let Some(index) = self
            .size_requests
            .iter()
            .position(|request| request.worker_id == worker_id && request.path == result.path)
        else {
            warn!(
                "Size result for {} from worker {worker_id} matches no request",
                result.path.display()
            );
            return;
        };
        let request = self.size_requests.remove(index);
        self.status.write().complete_stat_calculation();
        let _ = request.output.send(Ok(result.size));
    }

    fn check_job_complete(&mut self) {
        self.update_stats();
        let done = self.pool.as_ref().is_some_and(|pool| pool.pending() == 0);
        if done {
            self.status.write().worker_status = WorkerStatus::Finished;
            if self.scan_output.is_some() {
                match self.scan_started.take() {
                    Some(started) => info!("Scan completed in {:.2?}", started.elapsed()),
                    None => info!("Scan completed"),
                }
            }
            self.teardown();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.size_requests.iter().map(|request| request.deadline).min()
    }

    fn expire_size_requests(&mut self, now: Instant) {
        let timeout = self.config.size_timeout;
        let (expired, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.size_requests)
            .into_iter()
            .partition(|request| request.deadline <= now);
        self.size_requests = alive;

        for request in expired {
            error!(
                "Timeout calculating size for: {} ({timeout:?})",
                request.path.display()
            );
            self.status.write().abandon_stat_calculation();
            self.expired_sizes.push((request.worker_id, request.path.clone()));
            let _ = request.output.send(Err(ScanError::SizeTimeout {
                path: request.path,
                timeout,
            }));
        }
    }

    /// Scan-fatal failure: surface it on the scan stream and drop the pool.
    fn fail(&mut self, err: ScanError) {
        self.status.write().worker_status = WorkerStatus::Dead;
        if let Some(output) = &self.scan_output {
            let _ = output.send(Err(err));
        }
        self.teardown();
    }

    /// Drop the current pool. Outstanding size requests fail explicitly and
    /// the scan stream completes. Safe to call repeatedly.
    fn teardown(&mut self) {
        for request in self.size_requests.drain(..) {
            self.status.write().abandon_stat_calculation();
            let _ = request.output.send(Err(ScanError::Terminated {
                path: request.path,
            }));
        }
        // The next pool has a fresh uplink; nothing late can arrive from this one.
        self.expired_sizes.clear();
        self.scan_output = None;
        self.scan_started = None;
        // Dropping the links closes every inbox; workers exit on their own.
        if self.pool.take().is_some() {
            debug!("Workers torn down");
        }
    }

    fn update_stats(&self) {
        let Some(pool) = &self.pool else {
            return;
        };
        let mut status = self.status.write();
        status.pending_search_tasks = pool.pending();
        status.completed_search_tasks = pool.completed();
        status.workers_jobs = pool.reported.clone();
    }
}

#[cfg(test)]
impl Coordinator {
    /// Install a pool of detached links; returns the receiving ends.
    fn install_detached_pool(&mut self, count: usize) -> Vec<Receiver<WorkerMessage>> {
        let (links, inboxes): (Vec<_>, Vec<_>) = (0..count).map(WorkerLink::detached).unzip();
        let (_uplink_tx, uplink) = unbounded();
        self.pool = Some(Pool::with_workers(links, uplink));
        inboxes
    }
}
