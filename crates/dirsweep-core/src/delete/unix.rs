/// Unix deletion strategies backed by external tools.
use super::command::{
    empty_mirror_source, find_in_path, probe_status, run_ok, with_trailing_separator,
};
use super::DeletionStrategy;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// `File::Path::remove_tree` in a one-shot perl process.
pub struct PerlStrategy;

const PERL_REMOVE_TREE: &str = "remove_tree($ARGV[0], {verbose => 0, safe => 0})";

impl DeletionStrategy for PerlStrategy {
    fn name(&self) -> &str {
        "perl"
    }

    fn is_available(&self) -> io::Result<bool> {
        if find_in_path("perl").is_none() {
            return Ok(false);
        }
        // perl alone is not enough: the module must load too.
        Ok(probe_status("perl", ["-MFile::Path=remove_tree", "-e", "1"])?.success())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        run_ok(
            Command::new("perl")
                // Keep locale warnings off stderr.
                .env("LC_ALL", "C")
                .args(["-MFile::Path=remove_tree", "-e", PERL_REMOVE_TREE, "--"])
                .arg(path),
        )?;
        Ok(true)
    }
}

/// Mirror an empty directory onto the target, then remove the husk.
pub struct RsyncStrategy;

impl DeletionStrategy for RsyncStrategy {
    fn name(&self) -> &str {
        "rsync"
    }

    fn is_available(&self) -> io::Result<bool> {
        Ok(find_in_path("rsync").is_some())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        let empty = empty_mirror_source()?;
        run_ok(
            Command::new("rsync")
                .args(["-a", "--delete"])
                .arg(with_trailing_separator(empty.path()))
                .arg(with_trailing_separator(path)),
        )?;
        fs::remove_dir(path)?;
        Ok(true)
    }
}

/// Two `find` passes: everything that is not a directory, then the
/// directories depth-first.
pub struct FindStrategy;

impl DeletionStrategy for FindStrategy {
    fn name(&self) -> &str {
        "find"
    }

    fn is_available(&self) -> io::Result<bool> {
        Ok(find_in_path("find").is_some())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        run_ok(
            Command::new("find")
                .arg(path)
                .args(["-depth", "!", "-type", "d", "-delete"]),
        )?;
        run_ok(
            Command::new("find")
                .arg(path)
                .args(["-depth", "-type", "d", "-delete"]),
        )?;
        Ok(true)
    }
}

pub struct RmRfStrategy;

impl DeletionStrategy for RmRfStrategy {
    fn name(&self) -> &str {
        "rm-rf"
    }

    fn is_available(&self) -> io::Result<bool> {
        Ok(find_in_path("rm").is_some())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        run_ok(Command::new("rm").arg("-rf").arg("--").arg(path))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_tree(root: &Path) -> std::path::PathBuf {
        let target = root.join("node_modules");
        fs::create_dir_all(target.join("pkg/dist")).unwrap();
        fs::create_dir_all(target.join(".bin")).unwrap();
        fs::write(target.join("pkg/dist/index.js"), "export {}").unwrap();
        fs::write(target.join("pkg/package.json"), "{}").unwrap();
        target
    }

    /// Run `strategy` against a fresh tree when the host has the tool.
    fn check_strategy(strategy: &dyn DeletionStrategy) {
        if !strategy.is_available().unwrap_or(false) {
            eprintln!("skipping {}: not available on this host", strategy.name());
            return;
        }
        let tmp = TempDir::new().unwrap();
        let target = make_tree(tmp.path());
        // A path with a space must survive the trip through argv untouched.
        let spaced = tmp.path().join("with space");
        fs::create_dir(&spaced).unwrap();
        let spaced_target = make_tree(&spaced);

        assert!(strategy.delete(&target).unwrap());
        assert!(strategy.delete(&spaced_target).unwrap());
        assert!(!target.exists());
        assert!(!spaced_target.exists());
        assert!(spaced.exists());
    }

    #[test]
    fn test_perl_strategy() {
        check_strategy(&PerlStrategy);
    }

    #[test]
    fn test_rsync_strategy() {
        check_strategy(&RsyncStrategy);
    }

    #[test]
    fn test_find_strategy() {
        check_strategy(&FindStrategy);
    }

    #[test]
    fn test_rm_rf_strategy() {
        check_strategy(&RmRfStrategy);
    }

    #[test]
    fn test_command_failure_is_reported() {
        if !FindStrategy.is_available().unwrap_or(false) {
            return;
        }
        let tmp = TempDir::new().unwrap();
        assert!(FindStrategy.delete(&tmp.path().join("missing")).is_err());
    }
}
