/// Windows deletion strategies backed by external tools.
use super::command::{empty_mirror_source, find_in_path, probe_status, run, run_ok};
use super::DeletionStrategy;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

/// `robocopy /MIR` from an empty directory purges the target much faster
/// than Explorer-style recursive deletes.
pub struct RobocopyStrategy;

impl DeletionStrategy for RobocopyStrategy {
    fn name(&self) -> &str {
        "robocopy"
    }

    fn is_available(&self) -> io::Result<bool> {
        // `/?` exits with 16 on every robocopy version seen in the wild.
        let status = probe_status("robocopy", ["/?"])?;
        Ok(matches!(status.code(), Some(0) | Some(16)))
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        let empty = empty_mirror_source()?;
        run(
            Command::new("robocopy")
                .arg(empty.path())
                .arg(path)
                .args(["/MIR", "/NFL", "/NDL", "/NJH", "/NJS", "/NP"]),
            // 0-7 report what was copied; 8 and above are failures.
            |status| matches!(status.code(), Some(code) if code < 8),
        )?;
        fs::remove_dir(path)?;
        Ok(true)
    }
}

pub struct PowerShellStrategy;

impl DeletionStrategy for PowerShellStrategy {
    fn name(&self) -> &str {
        "powershell"
    }

    fn is_available(&self) -> io::Result<bool> {
        Ok(find_in_path("powershell").is_some())
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        run_ok(
            Command::new("powershell")
                .args(["-NoProfile", "-NonInteractive", "-Command"])
                .arg(remove_item_script(path)),
        )?;
        Ok(true)
    }
}

fn remove_item_script(path: &Path) -> String {
    let literal = ps_quote(&path.to_string_lossy());
    format!(
        "if (Test-Path -LiteralPath {literal}) {{ \
         Remove-Item -LiteralPath {literal} -Force -Recurse -ErrorAction Stop }}"
    )
}

/// Single-quoted PowerShell literal; `'` is escaped by doubling.
fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
