//! Helpers for strategies that shell out to system tools.
//!
//! Commands are always spawned directly with an argument vector; no shell is
//! involved, so paths never need quoting.

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::TempDir;

#[cfg(unix)]
use std::fs;

/// Locate `program` on `PATH`, like `command -v`.
pub(crate) fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    let exts = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".into());
    std::iter::once(dir.join(program))
        .chain(
            exts.split(';')
                .filter(|ext| !ext.is_empty())
                .map(|ext| dir.join(format!("{program}{ext}"))),
        )
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `command` to completion, discarding stdout.
///
/// Fails when `accept` rejects the exit status or when the tool wrote
/// anything to stderr.
pub(crate) fn run(
    command: &mut Command,
    accept: impl Fn(ExitStatus) -> bool,
) -> io::Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !accept(output.status) {
        return Err(io::Error::other(format!(
            "{program} exited with {}: {stderr}",
            output.status
        )));
    }
    if !stderr.is_empty() {
        return Err(io::Error::other(format!("{program}: {stderr}")));
    }
    Ok(())
}

/// Run with the conventional "exit code 0 means success" rule.
pub(crate) fn run_ok(command: &mut Command) -> io::Result<()> {
    run(command, |status| status.success())
}

/// Exit status of a probe command, with all output discarded.
pub(crate) fn probe_status<I, S>(program: &str, args: I) -> io::Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}

/// A fresh, empty directory used as the mirror source by rsync and robocopy.
/// It is removed when the guard drops, on success and failure alike.
pub(crate) fn empty_mirror_source() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix("dirsweep_empty_").tempdir()
}

/// `path` with a trailing separator, which mirror tools read as "contents of".
#[cfg(unix)]
pub(crate) fn with_trailing_separator(path: &Path) -> std::ffi::OsString {
    let mut s = path.as_os_str().to_os_string();
    s.push(std::path::MAIN_SEPARATOR_STR);
    s
}
