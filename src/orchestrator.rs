//! Per-source run sequencing
//!
//! One source at a time: fetch keys once, crawl the window, persist the
//! snapshot, dispatch downloads, emit a report. Batch runs process sources
//! sequentially with an inter-source delay so the aggregate request rate
//! stays predictable; a failing source is recorded and never aborts the
//! ones after it.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::AppConfig;
use crate::downloader::{
    BbdownCommand, DispatcherConfig, DownloadDispatcher, SourceReport, VideoDownloader,
};
use crate::fetcher::{ApiClient, CrawlerConfig, SpaceCrawler};
use crate::snapshot;
use crate::{TimeWindow, Uploader};

/// Orchestrator errors
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The HTTP client could not be constructed
    #[error("failed to set up API client: {0}")]
    Setup(String),
}

/// Aggregate result of one invocation.
#[derive(Debug)]
pub struct RunSummary {
    /// One report per processed source, in processing order
    pub reports: Vec<SourceReport>,
    /// Wall-clock duration of the run
    pub elapsed: std::time::Duration,
}

impl RunSummary {
    /// Whether every source completed without failures or degradation.
    pub fn is_clean(&self) -> bool {
        self.reports.iter().all(SourceReport::is_clean)
    }
}

/// Composes signing, crawling, snapshotting and dispatch per source.
pub struct Orchestrator {
    config: AppConfig,
    client: Arc<ApiClient>,
    crawler: SpaceCrawler,
    dispatcher: DownloadDispatcher,
}

impl Orchestrator {
    /// Build an orchestrator from a validated configuration.
    pub fn new(config: AppConfig) -> Result<Self, OrchestratorError> {
        let cookie = Some(config.auth.cookie.clone());
        let client = ApiClient::new(&config.network, cookie)
            .map_err(|e| OrchestratorError::Setup(e.to_string()))?;

        let crawler = SpaceCrawler::new(
            client.clone(),
            CrawlerConfig {
                page_size: config.network.page_size,
                max_pages: config.network.max_pages,
                page_delay: config.page_delay(),
            },
        );

        let downloader: Arc<dyn VideoDownloader> = Arc::new(BbdownCommand::new(
            config.download.command.clone(),
            std::time::Duration::from_secs(config.download.timeout_secs),
        ));
        let dispatcher = DownloadDispatcher::new(
            downloader,
            client.user_agent(),
            DispatcherConfig {
                concurrency: config.download.max_workers,
                check_downloaded: config.download.check_downloaded,
            },
        );

        Ok(Self {
            config,
            client,
            crawler,
            dispatcher,
        })
    }

    /// Replace the downloader implementation (tests inject mocks here).
    pub fn with_downloader(mut self, downloader: Arc<dyn VideoDownloader>) -> Self {
        self.dispatcher = DownloadDispatcher::new(
            downloader,
            self.client.user_agent(),
            DispatcherConfig {
                concurrency: self.config.download.max_workers,
                check_downloaded: self.config.download.check_downloaded,
            },
        );
        self
    }

    /// Run every configured source and return the aggregate summary.
    ///
    /// Always returns a summary, even under partial failure; only
    /// configuration precondition violations (checked before this point)
    /// prevent a run from starting.
    pub async fn run(&self) -> RunSummary {
        let started = Instant::now();
        let window = match self.config.time_window() {
            Ok(window) => window,
            Err(e) => {
                // Validated configs cannot reach this; treat it as an
                // empty run rather than panicking.
                error!(error = %e, "cannot resolve time window");
                return RunSummary {
                    reports: Vec::new(),
                    elapsed: started.elapsed(),
                };
            }
        };
        let uploaders = self.config.uploaders();
        info!(
            sources = uploaders.len(),
            window = %window,
            download_enabled = self.config.download.enabled,
            "run starting"
        );

        let mut reports = Vec::with_capacity(uploaders.len());
        for (i, uploader) in uploaders.iter().enumerate() {
            let report = self
                .process_source(uploader, &window)
                .instrument(info_span!("source", name = %uploader.name, mid = %uploader.mid))
                .await;
            info!(%report, "source finished");
            reports.push(report);

            if i + 1 < uploaders.len() {
                tokio::time::sleep(self.config.source_delay()).await;
            }
        }

        let summary = RunSummary {
            reports,
            elapsed: started.elapsed(),
        };
        info!(
            elapsed_secs = summary.elapsed.as_secs(),
            clean = summary.is_clean(),
            "run finished"
        );
        summary
    }

    /// Process one source end to end. Failures are recorded in the report,
    /// never propagated.
    async fn process_source(&self, uploader: &Uploader, window: &TimeWindow) -> SourceReport {
        let mut report = SourceReport::new(uploader.name.clone(), uploader.mid.clone());

        // Keys are fetched once per source; signing with absent keys is
        // pointless, so a failure here aborts with zero records processed.
        let keys = match self.client.fetch_wbi_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "key fetch failed, aborting source");
                report.degraded = Some(format!("key fetch failed: {e}"));
                return report;
            }
        };

        let outcome = self.crawler.crawl(&uploader.mid, &keys, window).await;
        report.found = outcome.records.len();
        report.truncated = outcome.truncated;
        report.degraded = outcome.degraded;

        if outcome.records.is_empty() {
            info!("no records in window");
            return report;
        }

        let snapshot_path = self.config.snapshot_path(&uploader.mid);
        match snapshot::write_snapshot(&snapshot_path, &outcome.records, self.config.data.format) {
            Ok(rows) => info!(path = %snapshot_path.display(), rows, "snapshot persisted"),
            // Snapshot trouble must not cost us the downloads.
            Err(e) => warn!(path = %snapshot_path.display(), error = %e, "snapshot write failed"),
        }

        if self.config.download.enabled {
            let work_dir = self.config.base.download_dir.join(uploader.folder_name());
            if let Err(e) = std::fs::create_dir_all(&work_dir) {
                warn!(dir = %work_dir.display(), error = %e, "cannot create download dir");
                report.degraded = Some(format!("cannot create download dir: {e}"));
                return report;
            }
            self.dispatcher
                .dispatch_all(&outcome.records, &work_dir, &mut report)
                .await;
        } else {
            info!("download disabled, scan only");
            report.skipped = outcome.records.len();
        }

        report
    }
}
