/// The frontend-facing API.
///
/// A [`Sweeper`] owns one [`ScanPool`], one [`DeletionManager`] and the
/// [`SharedStatus`] both report into. Frontends typically:
///
/// 1. [`Sweeper::validate_root`] the user's folder,
/// 2. [`Sweeper::start_scan`] and drain the returned receiver,
/// 3. [`Sweeper::get_size`] / [`Sweeper::newest_file`] per hit,
/// 4. [`Sweeper::delete`] what the user picks.
use crate::analysis::{self, NewestFile, RiskAnalysis};
use crate::config::{PoolConfig, ScanOptions, WorkerScanOptions};
use crate::delete::{DeleteOptions, DeletionManager};
use crate::error::{DeleteError, ScanError};
use crate::pool::{ScanItem, ScanPool, SizeItem};
use crate::status::{ScanStatus, SharedStatus};
use crossbeam_channel::{bounded, unbounded, Receiver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A scan hit, decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundFolder {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_analysis: Option<RiskAnalysis>,
}

pub struct Sweeper {
    pool: ScanPool,
    deletion: DeletionManager,
    status: SharedStatus,
    home: Option<PathBuf>,
}

impl Sweeper {
    /// Default pool sizing and the platform deletion chain.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(PoolConfig::default(), DeletionManager::for_current_platform())
    }

    pub fn with_config(config: PoolConfig, deletion: DeletionManager) -> Result<Self, ScanError> {
        let status = ScanStatus::shared();
        let pool = ScanPool::new(config, status.clone())?;
        Ok(Self {
            pool,
            deletion,
            status,
            home: analysis::home_dir(),
        })
    }

    /// Scan `root` for directories named in `options.targets`.
    ///
    /// The receiver yields each hit once and disconnects when the scan is
    /// exhausted or stopped. An `Err` item means the scan died.
    pub fn start_scan(&self, root: &Path, options: ScanOptions) -> Receiver<ScanItem> {
        let (tx, rx) = unbounded();
        self.pool.start_scan(tx, WorkerScanOptions::new(root, options));
        rx
    }

    /// Total disk usage of `path`. Exactly one item is delivered.
    pub fn get_size(&self, path: impl Into<PathBuf>) -> Receiver<SizeItem> {
        let (tx, rx) = bounded(1);
        self.pool.get_folder_size(tx, path.into());
        rx
    }

    pub fn stop_scan(&self) {
        self.pool.stop_scan();
    }

    /// Wrap a scan hit, with risk analysis when the options ask for it.
    pub fn found_folder(&self, path: PathBuf, options: &ScanOptions) -> FoundFolder {
        let risk_analysis = options
            .perform_risk_analysis
            .then(|| self.analyze_risk(&path));
        FoundFolder {
            path,
            risk_analysis,
        }
    }

    pub fn analyze_risk(&self, path: &Path) -> RiskAnalysis {
        analysis::analyze_risk(path, self.home.as_deref())
    }

    pub fn newest_file(&self, dir: &Path) -> Option<NewestFile> {
        analysis::newest_file(dir)
    }

    pub fn validate_root(&self, path: &Path) -> Result<(), ScanError> {
        analysis::validate_root(path)
    }

    /// Delete `path` with the selected strategy. Blocks until done.
    pub fn delete(&self, path: &Path, options: &DeleteOptions) -> Result<bool, DeleteError> {
        self.status.write().pending_deletions += 1;
        info!(
            "Deleting {}{}",
            path.display(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let result = self.deletion.delete_directory(path, options);

        {
            let mut status = self.status.write();
            status.pending_deletions = status.pending_deletions.saturating_sub(1);
        }
        if let Err(err) = &result {
            error!("Failed to delete {}: {err}", path.display());
        }
        result
    }

    pub fn selected_strategy_name(&self) -> Option<String> {
        self.deletion.selected_strategy_name()
    }

    pub fn deletion_manager(&self) -> &DeletionManager {
        &self.deletion
    }

    /// Point-in-time copy of the counters.
    pub fn status(&self) -> ScanStatus {
        self.status.read().clone()
    }

    /// Live handle for frontends that poll.
    pub fn shared_status(&self) -> SharedStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sweeper() -> Sweeper {
        Sweeper::with_config(PoolConfig::default(), DeletionManager::new()).unwrap()
    }

    #[test]
    fn test_found_folder_respects_risk_flag() {
        let s = sweeper();
        let path = PathBuf::from("/srv/app/node_modules");

        let with = s.found_folder(path.clone(), &ScanOptions::default());
        assert_eq!(with.risk_analysis.map(|r| r.is_sensitive), Some(false));

        let options = ScanOptions {
            perform_risk_analysis: false,
            ..ScanOptions::default()
        };
        assert_eq!(s.found_folder(path, &options).risk_analysis, None);
    }

    #[test]
    fn test_found_folder_json_shape() {
        let folder = FoundFolder {
            path: PathBuf::from("/srv/app/node_modules"),
            risk_analysis: Some(RiskAnalysis {
                is_sensitive: true,
                reason: Some("Inside Program Files folder"),
            }),
        };
        let json = serde_json::to_value(&folder).unwrap();
        assert_eq!(json["path"], "/srv/app/node_modules");
        assert_eq!(json["riskAnalysis"]["isSensitive"], true);
    }

    #[test]
    fn test_delete_without_strategies_reports_error() {
        let s = sweeper();
        let err = s
            .delete(Path::new("/nonexistent"), &DeleteOptions::default())
            .unwrap_err();
        assert!(matches!(err, DeleteError::NoStrategyAvailable));
        assert_eq!(s.status().pending_deletions, 0);
    }

    #[test]
    fn test_dry_run_delete_succeeds() {
        let s = sweeper();
        let options = DeleteOptions {
            dry_run: true,
            dry_run_delay: Duration::from_millis(1),
        };
        assert!(s.delete(Path::new("/nonexistent"), &options).unwrap());
        assert_eq!(s.status().pending_deletions, 0);
    }
}
