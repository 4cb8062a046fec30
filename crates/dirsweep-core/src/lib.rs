/// dirsweep core: scanning, sizing and deletion of target directories.
///
/// This crate contains the whole engine with zero UI dependencies. Frontends
/// consume three things from it: a stream of discovered directories, a size
/// query per path, and a delete operation per path.
///
/// # Modules
///
/// - [`pool`]: worker-thread pool, round-robin job dispatch and the walker
///   that runs inside every worker.
/// - [`delete`]: deletion strategies and the manager that probes and caches
///   the first one usable on this host.
/// - [`analysis`]: risk analysis, newest-file lookup and root validation.
/// - [`status`]: shared scan counters read by frontends.
/// - [`sweeper`]: the facade tying everything together.
pub mod analysis;
pub mod config;
pub mod delete;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod size;
pub mod status;
pub mod sweeper;

pub use analysis::{NewestFile, RiskAnalysis};
pub use config::{PoolConfig, ScanOptions, SortBy, WorkerScanOptions};
pub use delete::{DeleteOptions, DeletionManager, DeletionStrategy};
pub use error::{DeleteError, ScanError};
pub use pool::ScanPool;
pub use status::{ScanStatus, SharedStatus, WorkerStatus};
pub use sweeper::{FoundFolder, Sweeper};
