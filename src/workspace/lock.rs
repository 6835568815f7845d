use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Exclusive claim on remediating one repository/workflow pair.
///
/// Backed by a lock file created with `O_EXCL`; the file is removed when the
/// lock is dropped. A lock left by a crashed process must be removed by hand.
#[derive(Debug)]
pub struct AttemptLock {
    path: PathBuf,
}

impl AttemptLock {
    pub fn acquire(dir: &Path, repo_full_name: &str, workflow_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::Workspace(format!("Failed to create lock dir: {e}")))?;

        let path = dir.join(format!(
            "{}__{}.lock",
            repo_full_name.replace('/', "__"),
            workflow_id.replace('/', "__")
        ));

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::AttemptInProgress(path.display().to_string()));
            }
            Err(e) => {
                return Err(AppError::Workspace(format!(
                    "Failed to create lock file {}: {e}",
                    path.display()
                )));
            }
        };

        if let Err(e) = writeln!(
            file,
            "pid={} acquired_at={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        ) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to stamp attempt lock");
        }

        tracing::debug!(path = %path.display(), "Acquired attempt lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AttemptLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release attempt lock");
        }
    }
}
