/// Per-path questions a frontend asks about a found directory: is it risky
/// to delete, when was its project last touched, may the scan start here.
mod newest;
mod risk;

pub use newest::{newest_file, NewestFile};
pub use risk::{analyze_risk, RiskAnalysis};

use crate::error::ScanError;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// The user's home directory, from `HOME` or (on Windows) `USERPROFILE`.
pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Check that `path` exists, is a directory and can be listed.
pub fn validate_root(path: &Path) -> Result<(), ScanError> {
    let invalid = |reason| ScanError::InvalidRoot {
        path: path.to_path_buf(),
        reason,
    };

    let meta = fs::metadata(path).map_err(|_| invalid("the path does not exist"))?;
    if !meta.is_dir() {
        return Err(invalid("the path must point to a directory"));
    }
    fs::read_dir(path).map_err(|_| invalid("cannot read the specified path"))?;
    Ok(())
}

/// Last line of defence before a delete: the directory's own name must be
/// one of the scan targets.
pub fn is_safe_to_delete(path: &Path, targets: &BTreeSet<String>) -> bool {
    path.file_name()
        .map(|name| targets.contains(name.to_string_lossy().as_ref()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn targets() -> BTreeSet<String> {
        BTreeSet::from(["node_modules".to_string(), ".venv".to_string()])
    }

    #[test]
    fn test_validate_root_accepts_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(validate_root(tmp.path()).is_ok());
    }

    #[test]
    fn test_validate_root_rejects_missing_and_files() {
        let tmp = TempDir::new().unwrap();

        let err = validate_root(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidRoot {
                reason: "the path does not exist",
                ..
            }
        ));

        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = validate_root(&file).unwrap_err();
        assert!(err.to_string().contains("must point to a directory"));
    }

    #[test]
    fn test_is_safe_to_delete_checks_basename() {
        assert!(is_safe_to_delete(
            Path::new("/home/user/project/node_modules"),
            &targets()
        ));
        assert!(is_safe_to_delete(Path::new("/srv/app/.venv"), &targets()));
        assert!(!is_safe_to_delete(
            Path::new("/home/user/node_modules/project"),
            &targets()
        ));
        assert!(!is_safe_to_delete(Path::new("/"), &targets()));
    }
}
