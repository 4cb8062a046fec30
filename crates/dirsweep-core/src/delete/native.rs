/// In-process deletion with `std::fs`. Always available; the last resort of
/// every platform chain.
use super::DeletionStrategy;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub struct NativeStrategy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for NativeStrategy {
    /// Windows gets a few retries: virus scanners and indexers briefly lock
    /// freshly touched files.
    fn default() -> Self {
        Self {
            retries: if cfg!(windows) { 3 } else { 0 },
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl DeletionStrategy for NativeStrategy {
    fn name(&self) -> &str {
        "native"
    }

    fn is_available(&self) -> io::Result<bool> {
        Ok(true)
    }

    fn delete(&self, path: &Path) -> io::Result<bool> {
        let mut attempt = 0;
        loop {
            match remove_tree(path) {
                Ok(()) => return Ok(true),
                // Already gone is what we wanted.
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    debug!(
                        "Retrying delete of {} ({attempt}/{}): {err}",
                        path.display(),
                        self.retries
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::DirectoryNotEmpty | io::ErrorKind::AlreadyExists
            ) =>
        {
            // Something was created inside while we were removing; go again
            // bottom-up.
            remove_children(path)?;
            fs::remove_dir(path)
        }
        other => other,
    }
}

fn remove_children(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let result = if entry.file_type()?.is_dir() {
            remove_children(&path).and_then(|()| fs::remove_dir(&path))
        } else {
            fs::remove_file(&path)
        };
        match result {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
            _ => {}
        }
    }
    Ok(())
}
