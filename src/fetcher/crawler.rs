//! Incremental space crawler
//!
//! Walks the paginated listing under a time window. The listing is
//! reverse-chronological by convention, so the first entry older than the
//! window start is the early-stop signal: nothing on this or later pages
//! can still be in-window. Hitting the page cap without an early stop sets
//! a non-fatal truncation flag instead.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fetcher::http::{ApiClient, SPACE_REFERER};
use crate::fetcher::wire::{ArcSearchParams, ArcSearchResponse, ARC_SEARCH_PATH};
use crate::fetcher::FetcherError;
use crate::shutdown::SharedShutdown;
use crate::signing::{sign_params, KeyMaterial};
use crate::{TimeWindow, VideoRecord};

/// Crawler tuning knobs, taken from the network configuration.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Entries requested per page
    pub page_size: u32,
    /// Hard cap on pages fetched per source
    pub max_pages: u32,
    /// Mandatory delay between page requests
    pub page_delay: Duration,
}

/// Result of one crawl over one source.
///
/// Always returned, even when the crawl aborted: records accepted before
/// the failure are kept and `degraded` carries the abort reason.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Accepted records, in upstream (reverse-chronological) order
    pub records: Vec<VideoRecord>,
    /// Number of page requests actually issued
    pub pages_fetched: u32,
    /// True when the page cap was reached without seeing the early-stop
    /// signal; the window may extend past what was scanned
    pub truncated: bool,
    /// Abort reason when the crawl did not run to completion
    pub degraded: Option<String>,
}

/// Drives [`ApiClient`] across listing pages with window filtering and
/// early termination.
pub struct SpaceCrawler {
    client: Arc<ApiClient>,
    config: CrawlerConfig,
    shutdown: Option<SharedShutdown>,
}

impl SpaceCrawler {
    /// Create a crawler over a shared client.
    pub fn new(client: Arc<ApiClient>, config: CrawlerConfig) -> Self {
        Self {
            client,
            config,
            shutdown: crate::shutdown::global(),
        }
    }

    /// Attach a shutdown handle (otherwise the global one is used).
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Crawl `mid`'s catalog for records inside `window`.
    ///
    /// Pages are 1-indexed. An empty result list means catalog exhaustion;
    /// an entry older than the window start stops the crawl immediately.
    /// Unrecoverable fetch errors abort the crawl but keep the records
    /// accepted so far.
    pub async fn crawl(
        &self,
        mid: &str,
        keys: &KeyMaterial,
        window: &TimeWindow,
    ) -> CrawlOutcome {
        let mut outcome = CrawlOutcome {
            records: Vec::new(),
            pages_fetched: 0,
            truncated: false,
            degraded: None,
        };

        let mut page = 1u32;
        loop {
            if page > self.config.max_pages {
                info!(
                    max_pages = self.config.max_pages,
                    "page cap reached before leaving the window"
                );
                outcome.truncated = true;
                break;
            }
            if self.shutdown_requested() {
                warn!("shutdown requested, stopping crawl");
                outcome.degraded = Some("shutdown requested".to_string());
                break;
            }

            let params = ArcSearchParams::new(mid, self.config.page_size, page).to_pairs();
            let now = chrono::Local::now().timestamp();
            let signed = sign_params(&params, keys, now);

            let response: ArcSearchResponse = match self
                .client
                .get_json(ARC_SEARCH_PATH, &signed, SPACE_REFERER)
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(page, error = %e, "aborting crawl after fetch failure");
                    outcome.degraded = Some(e.to_string());
                    break;
                }
            };
            outcome.pages_fetched += 1;

            if response.code != 0 {
                let err = FetcherError::Api {
                    code: response.code,
                    message: response.message,
                };
                warn!(page, error = %err, "aborting crawl on API error");
                outcome.degraded = Some(err.to_string());
                break;
            }

            let vlist = response
                .data
                .map(|d| d.list.vlist)
                .unwrap_or_default();
            if vlist.is_empty() {
                debug!(page, "empty page, catalog exhausted");
                break;
            }

            let mut accepted_on_page = 0usize;
            let mut early_stop = false;
            for entry in vlist {
                if window.contains(entry.created) {
                    outcome.records.push(entry.into());
                    accepted_on_page += 1;
                } else if entry.created < window.start {
                    // Reverse-chronological listing: everything after this
                    // point is older still.
                    early_stop = true;
                    break;
                }
                // Entries newer than the window end are skipped but do not
                // terminate the scan.
            }

            debug!(page, accepted = accepted_on_page, "page processed");
            if early_stop {
                info!(page, "entry older than window start, stopping early");
                break;
            }

            page += 1;
            if page <= self.config.max_pages {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        info!(
            records = outcome.records.len(),
            pages = outcome.pages_fetched,
            truncated = outcome.truncated,
            degraded = outcome.degraded.is_some(),
            "crawl finished"
        );
        outcome
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_triggered())
            .unwrap_or(false)
    }
}
