/// Most recently modified file below a directory.
///
/// Used to show how long a project has been untouched. Dependency and build
/// output folders are skipped since their mtimes say nothing about the
/// user's own activity.
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const IGNORED_DIRS: [&str; 4] = ["node_modules", ".git", "coverage", "dist"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewestFile {
    pub path: PathBuf,
    pub name: String,
    pub modified: DateTime<Local>,
}

/// `None` when nothing readable was found (including an unreadable `dir`).
pub fn newest_file(dir: &Path) -> Option<NewestFile> {
    jwalk::WalkDir::new(dir)
        .skip_hidden(false)
        .follow_links(false)
        .sort(false)
        .process_read_dir(|_depth, _path, _state, children| {
            children.retain(|entry| match entry {
                Ok(e) if e.file_type().is_dir() => !is_ignored(&e.file_name().to_string_lossy()),
                _ => true,
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| {
            let path = entry.path();
            // Follows symlinks; broken ones fail here and are skipped.
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((path, modified))
        })
        .max_by_key(|(_, modified)| *modified)
        .map(|(path, modified)| NewestFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            modified: DateTime::<Local>::from(modified),
        })
}

fn is_ignored(name: &str) -> bool {
    IGNORED_DIRS
        .iter()
        .any(|ignored| name.eq_ignore_ascii_case(ignored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, age: Duration) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_newest_file_picks_latest_mtime() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("old.txt"), Duration::from_secs(3600));
        touch(&root.join("src/new.rs"), Duration::from_secs(10));
        touch(&root.join("src/lib/mid.rs"), Duration::from_secs(600));

        let newest = newest_file(root).unwrap();
        assert_eq!(newest.name, "new.rs");
        assert_eq!(newest.path, root.join("src/new.rs"));
    }

    #[test]
    fn test_newest_file_skips_ignored_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("package.json"), Duration::from_secs(7200));
        touch(&root.join("node_modules/a/index.js"), Duration::ZERO);
        touch(&root.join(".git/HEAD"), Duration::ZERO);
        touch(&root.join("Dist/bundle.js"), Duration::ZERO);
        touch(&root.join("coverage/lcov.info"), Duration::ZERO);

        let newest = newest_file(root).unwrap();
        assert_eq!(newest.name, "package.json");
    }

    #[test]
    fn test_newest_file_of_empty_or_missing_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        assert_eq!(newest_file(&tmp.path().join("empty")), None);
        assert_eq!(newest_file(&tmp.path().join("missing")), None);
    }
}
