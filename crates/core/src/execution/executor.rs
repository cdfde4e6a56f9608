//! Subprocess execution inside a job directory.
//!
//! The rendered command line is handed to `sh -c` with the job directory as
//! working directory. stdout and stderr are drained on their own tasks while
//! the child is awaited, so a chatty process can never block on a full pipe.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::session::JobSession;
use crate::error::RunError;

/// Everything captured from one subprocess run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, or the negated signal number if the process was killed.
    pub returncode: i32,
    pub elapsed: Duration,
}

/// Run `command_line` in the session's job directory.
///
/// A non-zero exit status is returned as data. Only a failure to spawn or
/// wait on the child, or an expired `timeout`, is an error. On timeout the
/// child's whole process group is killed.
pub async fn execute(
    session: &JobSession,
    command_line: &str,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, RunError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command_line)
        .current_dir(session.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a deadline can take down everything `sh` started.
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(RunError::Spawn)?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => waited,
            Err(_elapsed) => {
                kill_process_group(&child);
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::warn!(job_id = %session.job_id(), elapsed_ms, "Command timed out");
                return Err(RunError::Timeout { elapsed_ms });
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| RunError::io("failed to wait for command", e))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let elapsed = start.elapsed();
    let returncode = exit_code(status);

    tracing::info!(
        job_id = %session.job_id(),
        returncode,
        elapsed_ms = elapsed.as_millis() as u64,
        stderr = %String::from_utf8_lossy(&stderr),
        "Command executed",
    );

    Ok(ProcessOutput {
        stdout,
        stderr,
        returncode,
        elapsed,
    })
}

/// SIGKILL every process in the child's group.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // Safety: killpg only sends a signal; the group id is the child's pid
    // because it was spawned with `process_group(0)`.
    let ret = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "killpg failed"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

/// Read an entire output stream into a byte buffer.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
