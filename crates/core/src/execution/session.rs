//! Per-run job identity and scratch directory.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::RunError;

/// Owns one run's job id and its scratch directory.
///
/// The directory is created by [`JobSession::open`] and removed recursively
/// by [`JobSession::close`] on the blocking thread pool. A session dropped
/// without being closed (a cancelled run) removes the directory in `Drop`.
/// Removal tolerates a directory that is already gone.
#[derive(Debug)]
pub struct JobSession {
    job_id: String,
    path: PathBuf,
    closed: bool,
}

impl JobSession {
    /// Generate a fresh job id and create `<base_dir>/<job_id>`.
    pub async fn open(base_dir: &Path) -> Result<Self, RunError> {
        let job_id = Uuid::new_v4().to_string();
        let session = Self {
            path: base_dir.join(&job_id),
            job_id,
            closed: false,
        };

        // On failure `session` is dropped, which removes anything that
        // create_dir_all managed to create.
        tokio::fs::create_dir_all(&session.path)
            .await
            .map_err(|e| {
                RunError::io(
                    format!("failed to create job directory {}", session.path.display()),
                    e,
                )
            })?;

        tracing::debug!(job_id = %session.job_id, path = %session.path.display(), "Job directory created");
        Ok(session)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Scratch directory, as derived from the base directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the job directory without blocking the async runtime.
    pub async fn close(mut self) {
        self.closed = true;
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || std::fs::remove_dir_all(path)).await {
            Ok(result) => report_removal(&self.job_id, &self.path, result),
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Job directory removal task failed");
            }
        }
    }

    /// Absolute form of [`path`](Self::path).
    pub fn absolute_path(&self) -> PathBuf {
        std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone())
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        if !self.closed {
            report_removal(&self.job_id, &self.path, std::fs::remove_dir_all(&self.path));
        }
    }
}

fn report_removal(job_id: &str, path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => {
            tracing::debug!(job_id, "Job directory removed");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                job_id,
                path = %path.display(),
                error = %e,
                "Failed to remove job directory",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
