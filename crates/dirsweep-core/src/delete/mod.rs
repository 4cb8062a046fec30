/// Directory deletion.
///
/// A [`DeletionManager`] holds an ordered list of [`DeletionStrategy`]s. On
/// first use it probes them in registration order and caches the first one
/// that reports itself available; later deletions go straight to the cached
/// strategy without probing again. Probing is the expensive part (it spawns
/// processes), so it happens at most once per manager unless
/// [`DeletionManager::reset_strategy`] is called.
///
/// The platform chains registered by [`DeletionManager::for_current_platform`]
/// put external tools first because they outrun `remove_dir_all` on huge
/// `node_modules` trees, and end with the in-process [`native`] strategy, which
/// is always available.
mod command;
pub mod native;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use crate::error::DeleteError;
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Simulated deletion time for dry runs.
pub const DRY_RUN_DELAY: Duration = Duration::from_millis(200);

/// One way of removing a directory tree.
pub trait DeletionStrategy: Send + Sync {
    /// Stable, human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether this strategy can run on this host. An `Err` is treated as
    /// "unavailable" by the manager.
    fn is_available(&self) -> io::Result<bool>;

    /// Remove `path` and everything below it.
    fn delete(&self, path: &Path) -> io::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Skip the strategy chain entirely and pretend the deletion succeeded.
    pub dry_run: bool,
    pub dry_run_delay: Duration,
}

impl DeleteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            dry_run_delay: DRY_RUN_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Unprobed,
    Selected(usize),
    NoneAvailable,
}

pub struct DeletionManager {
    strategies: Vec<Box<dyn DeletionStrategy>>,
    selection: Mutex<Selection>,
}

impl DeletionManager {
    /// A manager with no strategies registered.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            selection: Mutex::new(Selection::Unprobed),
        }
    }

    /// The strategy chain for the host platform, fastest first.
    pub fn for_current_platform() -> Self {
        let mut manager = Self::new();

        #[cfg(unix)]
        {
            manager.register_strategy(unix::PerlStrategy);
            manager.register_strategy(unix::RsyncStrategy);
            manager.register_strategy(unix::FindStrategy);
            manager.register_strategy(unix::RmRfStrategy);
        }

        #[cfg(windows)]
        {
            manager.register_strategy(windows::RobocopyStrategy);
            manager.register_strategy(windows::PowerShellStrategy);
        }

        manager.register_strategy(native::NativeStrategy::default());
        manager
    }

    /// Append a strategy. Registration order is probe order.
    ///
    /// A cached selection is dropped so the new strategy gets considered.
    pub fn register_strategy(&mut self, strategy: impl DeletionStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
        *self.selection.get_mut() = Selection::Unprobed;
    }

    /// Probe (once) and return the selected strategy, if any is available.
    pub fn initialize_strategy(&self) -> Option<&dyn DeletionStrategy> {
        let mut selection = self.selection.lock();
        if *selection == Selection::Unprobed {
            *selection = self.probe();
        }
        match *selection {
            Selection::Selected(index) => self.strategies.get(index).map(|s| s.as_ref()),
            Selection::Unprobed | Selection::NoneAvailable => None,
        }
    }

    fn probe(&self) -> Selection {
        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.is_available() {
                Ok(true) => {
                    info!("Using {} deletion strategy", strategy.name());
                    return Selection::Selected(index);
                }
                Ok(false) => debug!("Deletion strategy {} not available", strategy.name()),
                Err(err) => warn!("Strategy {} check failed: {err}", strategy.name()),
            }
        }
        warn!("No deletion strategy available");
        Selection::NoneAvailable
    }

    /// Delete `path` with the selected strategy.
    ///
    /// Dry runs never touch the strategies: they wait `dry_run_delay` and
    /// report success.
    pub fn delete_directory(
        &self,
        path: &Path,
        options: &DeleteOptions,
    ) -> Result<bool, DeleteError> {
        if options.dry_run {
            debug!("Dry run: pretending to delete {}", path.display());
            thread::sleep(options.dry_run_delay);
            return Ok(true);
        }

        let strategy = self
            .initialize_strategy()
            .ok_or(DeleteError::NoStrategyAvailable)?;

        strategy
            .delete(path)
            .map_err(|source| DeleteError::StrategyFailed {
                strategy: strategy.name().to_string(),
                source,
            })
    }

    /// Forget the cached selection; the next deletion probes again.
    pub fn reset_strategy(&self) {
        *self.selection.lock() = Selection::Unprobed;
    }

    pub fn selected_strategy_name(&self) -> Option<String> {
        match *self.selection.lock() {
            Selection::Selected(index) => self.strategies.get(index).map(|s| s.name().to_string()),
            Selection::Unprobed | Selection::NoneAvailable => None,
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for DeletionManager {
    fn default() -> Self {
        Self::for_current_platform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Probe {
        Available,
        Unavailable,
        Broken,
    }

    #[derive(Default)]
    struct Calls {
        probes: AtomicUsize,
        deletes: AtomicUsize,
    }

    struct FakeStrategy {
        name: &'static str,
        probe: Probe,
        fail_delete: bool,
        calls: Arc<Calls>,
    }

    impl FakeStrategy {
        fn new(name: &'static str, probe: Probe) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            (
                Self {
                    name,
                    probe,
                    fail_delete: false,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl DeletionStrategy for FakeStrategy {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> io::Result<bool> {
            self.calls.probes.fetch_add(1, Ordering::SeqCst);
            match self.probe {
                Probe::Available => Ok(true),
                Probe::Unavailable => Ok(false),
                Probe::Broken => Err(io::Error::other("probe exploded")),
            }
        }

        fn delete(&self, _path: &Path) -> io::Result<bool> {
            self.calls.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "EACCES"))
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn test_first_available_strategy_is_selected_once() {
        let (a, a_calls) = FakeStrategy::new("a", Probe::Unavailable);
        let (b, b_calls) = FakeStrategy::new("b", Probe::Available);
        let (c, c_calls) = FakeStrategy::new("c", Probe::Available);
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);
        manager.register_strategy(b);
        manager.register_strategy(c);

        let path = Path::new("/tmp/whatever");
        assert!(manager.delete_directory(path, &DeleteOptions::default()).unwrap());
        assert!(manager.delete_directory(path, &DeleteOptions::default()).unwrap());

        assert_eq!(manager.selected_strategy_name().as_deref(), Some("b"));
        assert_eq!(a_calls.probes.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.probes.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.probes.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.deletes.load(Ordering::SeqCst), 2);
        assert_eq!(c_calls.deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_probe_error_counts_as_unavailable() {
        let (a, _) = FakeStrategy::new("a", Probe::Broken);
        let (b, _) = FakeStrategy::new("b", Probe::Available);
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);
        manager.register_strategy(b);

        assert_eq!(manager.initialize_strategy().map(|s| s.name()), Some("b"));
    }

    #[test]
    fn test_no_strategy_available() {
        let (a, a_calls) = FakeStrategy::new("a", Probe::Unavailable);
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);

        let err = manager
            .delete_directory(Path::new("/x"), &DeleteOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeleteError::NoStrategyAvailable));
        assert_eq!(err.to_string(), "no deletion strategy available on this system");
        assert_eq!(manager.selected_strategy_name(), None);

        // The negative result is cached as well.
        let _ = manager.delete_directory(Path::new("/x"), &DeleteOptions::default());
        assert_eq!(a_calls.probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strategy_failure_carries_strategy_name() {
        let (mut a, _) = FakeStrategy::new("perl", Probe::Available);
        a.fail_delete = true;
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);

        let err = manager
            .delete_directory(Path::new("/x"), &DeleteOptions::default())
            .unwrap_err();
        match &err {
            DeleteError::StrategyFailed { strategy, source } => {
                assert_eq!(strategy, "perl");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().starts_with("deletion failed using perl strategy"));
    }

    #[test]
    fn test_reset_forces_reprobe() {
        let (a, a_calls) = FakeStrategy::new("a", Probe::Available);
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);

        manager.initialize_strategy();
        manager.initialize_strategy();
        assert_eq!(a_calls.probes.load(Ordering::SeqCst), 1);

        manager.reset_strategy();
        assert_eq!(manager.selected_strategy_name(), None);
        manager.initialize_strategy();
        assert_eq!(a_calls.probes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dry_run_never_touches_strategies() {
        let (a, a_calls) = FakeStrategy::new("a", Probe::Available);
        let mut manager = DeletionManager::new();
        manager.register_strategy(a);

        let options = DeleteOptions {
            dry_run: true,
            dry_run_delay: Duration::from_millis(1),
        };
        assert!(manager.delete_directory(Path::new("/x"), &options).unwrap());
        assert_eq!(a_calls.probes.load(Ordering::SeqCst), 0);
        assert_eq!(a_calls.deletes.load(Ordering::SeqCst), 0);

        // Even with nothing registered.
        assert!(DeletionManager::new()
            .delete_directory(Path::new("/x"), &options)
            .unwrap());
    }

    #[test]
    fn test_platform_chain_order() {
        let manager = DeletionManager::for_current_platform();
        let names = manager.strategy_names();
        assert_eq!(names.last(), Some(&"native"));
        #[cfg(unix)]
        assert_eq!(names, vec!["perl", "rsync", "find", "rm-rf", "native"]);
        #[cfg(windows)]
        assert_eq!(names, vec!["robocopy", "powershell", "native"]);
    }

    #[test]
    fn test_platform_chain_deletes_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("node_modules");
        std::fs::create_dir_all(target.join("pkg/lib")).unwrap();
        std::fs::write(target.join("pkg/lib/index.js"), "module.exports = 1;").unwrap();

        let manager = DeletionManager::for_current_platform();
        assert!(manager
            .delete_directory(&target, &DeleteOptions::default())
            .unwrap());
        assert!(!target.exists());
        assert!(manager.selected_strategy_name().is_some());
    }
}
