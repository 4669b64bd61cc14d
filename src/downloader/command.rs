//! External downloader invocation
//!
//! The actual download work is delegated to an external executable
//! (`bbdown` by default) invoked once per item with the target directory,
//! an identification User-Agent and the item's short id. The trait seam
//! exists so the dispatcher can be exercised without a real downloader on
//! the PATH.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::downloader::config::DEFAULT_DOWNLOAD_TIMEOUT;

/// Terminal state of one downloader invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Process exited with code zero
    Success,
    /// Process exited non-zero or could not be driven
    Failed {
        /// Captured diagnostic output or launch error
        reason: String,
    },
    /// Process exceeded the wall-clock timeout and was killed
    TimedOut,
}

/// Something that can download one item into a directory.
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Download `short_id` into `work_dir`, identifying as `user_agent`.
    ///
    /// Must not panic and must always resolve to a terminal
    /// [`DownloadStatus`]; the dispatcher records whatever comes back.
    async fn download(&self, short_id: &str, user_agent: &str, work_dir: &Path) -> DownloadStatus;
}

/// Invokes the `bbdown` executable as a child process.
#[derive(Debug, Clone)]
pub struct BbdownCommand {
    program: String,
    timeout: Duration,
}

impl BbdownCommand {
    /// Invoker for `program` with the given per-call timeout.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Default for BbdownCommand {
    fn default() -> Self {
        Self::new("bbdown", DEFAULT_DOWNLOAD_TIMEOUT)
    }
}

#[async_trait]
impl VideoDownloader for BbdownCommand {
    async fn download(&self, short_id: &str, user_agent: &str, work_dir: &Path) -> DownloadStatus {
        let mut child = match Command::new(&self.program)
            .arg("--work-dir")
            .arg(work_dir)
            .arg("-ua")
            .arg(user_agent)
            .arg(short_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return DownloadStatus::Failed {
                    reason: format!("failed to launch {}: {e}", self.program),
                }
            }
        };

        // Drain both pipes concurrently so the child never blocks on a full
        // pipe buffer while we wait for it to exit.
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(out) = stdout.as_mut() {
                let _ = out.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(err) = stderr.as_mut() {
                let _ = err.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return DownloadStatus::Failed {
                    reason: format!("failed to wait for {}: {e}", self.program),
                }
            }
            Err(_elapsed) => {
                warn!(
                    short_id,
                    timeout_secs = self.timeout.as_secs(),
                    "download exceeded timeout, killing process"
                );
                let _ = child.start_kill();
                let _ = child.wait().await;
                return DownloadStatus::TimedOut;
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            debug!(short_id, "download process exited cleanly");
            DownloadStatus::Success
        } else {
            let diagnostics = if stderr.is_empty() { stdout } else { stderr };
            DownloadStatus::Failed {
                reason: format!(
                    "exit status {}: {}",
                    status,
                    String::from_utf8_lossy(&diagnostics).trim()
                ),
            }
        }
    }
}
