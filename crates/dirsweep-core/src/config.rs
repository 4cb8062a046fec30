/// Scan and pool configuration.
///
/// Everything here is plain data: built by the caller, immutable for the
/// duration of a scan, and copied into every worker at startup.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard cap on the number of worker threads in a pool.
pub const MAX_WORKERS: usize = 8;

/// Maximum directory reads in flight per worker.
///
/// Higher values speed up the crawl inside a worker but raise peak memory,
/// since every in-flight read buffers its whole batch.
pub const MAX_OPEN_DIRS: usize = 100;

/// How long a single size query may stay unanswered.
pub const SIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// How results are meant to be ordered by the consumer.
///
/// The engine itself never sorts; results arrive interleaved across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    Path,
    Size,
    LastMod,
}

/// What to look for and what to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    /// Directory names that count as a hit (exact name equality).
    pub targets: BTreeSet<String>,
    /// Substrings; any candidate path containing one is skipped.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    /// Attach a [`crate::analysis::RiskAnalysis`] to every hit.
    #[serde(default = "default_true")]
    pub perform_risk_analysis: bool,
}

fn default_true() -> bool {
    true
}

impl ScanOptions {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            targets: BTreeSet::from(["node_modules".to_string()]),
            exclude: Vec::new(),
            sort_by: None,
            perform_risk_analysis: true,
        }
    }
}

/// [`ScanOptions`] plus the root, as broadcast to every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerScanOptions {
    pub root_path: PathBuf,
    #[serde(flatten)]
    pub options: ScanOptions,
}

impl WorkerScanOptions {
    pub fn new(root_path: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root_path: root_path.into(),
            options,
        }
    }

    /// Substring containment, case-sensitive. `"ignorethis"` also excludes
    /// `/home/user/andignorethis`.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.options.exclude.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.options
            .exclude
            .iter()
            .any(|ex| path.contains(ex.as_str()))
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.options.targets.contains(name)
    }
}

/// Sizing and timing knobs for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Upper bound on worker threads (see [`crate::pool::optimal_worker_count`]).
    pub max_workers: usize,
    /// Maximum directory reads in flight per worker.
    pub max_open_dirs: usize,
    /// Threads each worker uses for blocking filesystem calls.
    pub io_threads_per_worker: usize,
    pub size_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            max_open_dirs: MAX_OPEN_DIRS,
            io_threads_per_worker: 4,
            size_timeout: SIZE_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(exclude: &[&str]) -> WorkerScanOptions {
        WorkerScanOptions::new(
            "/home/user",
            ScanOptions::new(["node_modules"]).with_exclude(exclude.iter().copied()),
        )
    }

    #[test]
    fn test_exclude_is_substring_match() {
        let o = opts(&["user/ignorethis"]);
        assert!(o.is_excluded(Path::new("/home/user/ignorethis")));
        assert!(o.is_excluded(Path::new("/home/user/ignorethis/deeper")));
        assert!(!o.is_excluded(Path::new("/home/user/andNOTignorethis")));
    }

    #[test]
    fn test_exclude_matches_inside_segment() {
        let o = opts(&["ignorethis"]);
        assert!(o.is_excluded(Path::new("/home/user/andignorethis-but-not-really")));
    }

    #[test]
    fn test_exclude_is_case_sensitive() {
        let o = opts(&["Cache"]);
        assert!(!o.is_excluded(Path::new("/home/user/cache")));
        assert!(o.is_excluded(Path::new("/home/user/Cache")));
    }

    #[test]
    fn test_empty_exclude_list_excludes_nothing() {
        assert!(!opts(&[]).is_excluded(Path::new("/anything")));
    }

    #[test]
    fn test_target_requires_exact_name() {
        let o = WorkerScanOptions::new("/", ScanOptions::new(["node_modules", ".venv"]));
        assert!(o.is_target("node_modules"));
        assert!(o.is_target(".venv"));
        assert!(!o.is_target("node_modules_old"));
        assert!(!o.is_target("Node_Modules"));
        assert!(!o.is_target("venv"));
    }

    #[test]
    fn test_scan_options_deserialize_defaults() {
        let o: ScanOptions = serde_json::from_str(r#"{"targets":["target"]}"#).unwrap();
        assert!(o.exclude.is_empty());
        assert!(o.perform_risk_analysis);
        assert_eq!(o.sort_by, None);
    }
}
