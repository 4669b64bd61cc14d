//! Bounded-concurrency download dispatch
//!
//! Records are filtered through the local index, then fed to a fixed-size
//! worker pool. Every worker resolves to a terminal outcome which is sent
//! over a single collector channel; the report is the only accumulation
//! point, so no counters are written concurrently.

use futures_util::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::downloader::command::{DownloadStatus, VideoDownloader};
use crate::downloader::report::{DownloadOutcome, SourceReport};
use crate::local_index::LocalStateIndex;
use crate::shutdown::SharedShutdown;
use crate::user_agent::UserAgentPolicy;
use crate::VideoRecord;

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker-pool size
    pub concurrency: usize,
    /// Whether to consult the local index before dispatching
    pub check_downloaded: bool,
}

/// Fixed-size worker pool over the external downloader.
pub struct DownloadDispatcher {
    downloader: Arc<dyn VideoDownloader>,
    user_agent: UserAgentPolicy,
    config: DispatcherConfig,
    shutdown: Option<SharedShutdown>,
}

impl DownloadDispatcher {
    /// Create a dispatcher around a downloader implementation.
    pub fn new(
        downloader: Arc<dyn VideoDownloader>,
        user_agent: UserAgentPolicy,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            downloader,
            user_agent,
            config,
            shutdown: crate::shutdown::global(),
        }
    }

    /// Attach a shutdown handle (otherwise the global one is used).
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Dispatch every record that has no artifact under `work_dir` yet,
    /// accumulating outcomes into `report`.
    ///
    /// Workers are independent: a failed or timed-out item never cancels
    /// its siblings, and nothing here retries. The skip decision is made
    /// once, up front, so two concurrent workers never race on the same
    /// item within one run.
    pub async fn dispatch_all(
        &self,
        records: &[VideoRecord],
        work_dir: &Path,
        report: &mut SourceReport,
    ) {
        let index = LocalStateIndex::new(work_dir);

        let mut to_download = Vec::new();
        for record in records {
            if self.config.check_downloaded && index.is_present(&record.bvid) {
                debug!(bvid = %record.bvid, "artifact already present, skipping");
                report.record(&record.bvid, &DownloadOutcome::AlreadyPresent);
            } else {
                to_download.push(record.clone());
            }
        }

        if to_download.is_empty() {
            info!("nothing to download");
            report.finalize();
            return;
        }
        info!(
            count = to_download.len(),
            concurrency = self.config.concurrency,
            "dispatching downloads"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<(String, DownloadOutcome)>();

        let concurrency = self.config.concurrency.max(1);
        futures_util::stream::iter(to_download)
            .for_each_concurrent(concurrency, |record| {
                let tx = tx.clone();
                async move {
                    if self.shutdown_requested() {
                        warn!(bvid = %record.bvid, "shutdown requested, not dispatching");
                        let _ = tx.send((record.bvid.clone(), DownloadOutcome::AlreadyPresent));
                        return;
                    }

                    let ua = self.user_agent.next();
                    info!(bvid = %record.bvid, title = %record.title, "starting download");
                    let status = self
                        .downloader
                        .download(&record.bvid, &ua, work_dir)
                        .await;

                    let outcome = match status {
                        DownloadStatus::Success => DownloadOutcome::Succeeded,
                        DownloadStatus::Failed { reason } => {
                            warn!(bvid = %record.bvid, reason = %reason, "download failed");
                            DownloadOutcome::Failed { reason }
                        }
                        DownloadStatus::TimedOut => {
                            warn!(bvid = %record.bvid, "download timed out");
                            DownloadOutcome::TimedOut
                        }
                    };
                    let _ = tx.send((record.bvid.clone(), outcome));
                }
            })
            .await;
        drop(tx);

        // Single collector: outcomes arrive in completion order, which is
        // unrelated to discovery order.
        while let Some((bvid, outcome)) = rx.recv().await {
            report.record(&bvid, &outcome);
        }
        report.finalize();

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            timed_out = report.timed_out,
            skipped = report.skipped,
            "dispatch complete"
        );
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_triggered())
            .unwrap_or(false)
    }
}
