//! Purpose: Scoped change of the process working directory around native calls.
//! Exports: `WorkingDirectory`.
//! Role: The kernel resolves relative input/output paths against the cwd at call time.
//! Invariants: The previous cwd is restored on drop, including on error and unwind paths.
//! Invariants: The cwd is process-wide; at most one guard may be live per process.
//!   Two sessions bound to different directories must not call into native code
//!   from different threads at the same time.
use std::env;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

#[derive(Debug)]
#[must_use = "the previous directory is restored when the guard is dropped"]
pub struct WorkingDirectory {
    previous: PathBuf,
}

impl WorkingDirectory {
    pub fn enter(dir: &Path) -> Result<Self, Error> {
        let previous = env::current_dir().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read current directory")
                .with_source(err)
        })?;
        env::set_current_dir(dir).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to enter working directory")
                .with_path(dir)
                .with_source(err)
        })?;
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            tracing::warn!(
                path = %self.previous.display(),
                error = %err,
                "failed to restore working directory"
            );
        }
    }
}

// Unit tests that change the process cwd take turns through this lock.
#[cfg(test)]
pub(crate) fn cwd_lock() -> std::sync::MutexGuard<'static, ()> {
    static CWD: std::sync::Mutex<()> = std::sync::Mutex::new(());
    CWD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
