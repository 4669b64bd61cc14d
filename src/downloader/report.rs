//! Per-source run reporting

use serde::Serialize;
use std::fmt;

/// Terminal outcome of one record within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A matching artifact already existed on disk
    AlreadyPresent,
    /// The downloader exited with code zero
    Succeeded,
    /// The downloader exited non-zero
    Failed {
        /// Captured diagnostic output
        reason: String,
    },
    /// The downloader was killed after exceeding the timeout
    TimedOut,
}

/// Aggregate counts for one source and one invocation.
///
/// Completion order inside the worker pool is unordered relative to
/// discovery order, so the failed-id list is sorted before emission.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceReport {
    /// Uploader display name
    pub source: String,
    /// Uploader space id
    pub mid: String,
    /// Records discovered by the crawl
    pub found: usize,
    /// Records skipped because an artifact was already present
    pub skipped: usize,
    /// Records downloaded successfully this run
    pub succeeded: usize,
    /// Records whose download failed
    pub failed: usize,
    /// Records whose download timed out
    pub timed_out: usize,
    /// Short ids of failed and timed-out records, sorted
    pub failed_ids: Vec<String>,
    /// True when the crawl hit its page cap without leaving the window
    pub truncated: bool,
    /// Abort reason when the source did not complete cleanly
    pub degraded: Option<String>,
}

impl SourceReport {
    /// Empty report for one source.
    pub fn new(source: impl Into<String>, mid: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mid: mid.into(),
            ..Self::default()
        }
    }

    /// Record one terminal outcome.
    pub fn record(&mut self, short_id: &str, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::AlreadyPresent => self.skipped += 1,
            DownloadOutcome::Succeeded => self.succeeded += 1,
            DownloadOutcome::Failed { .. } => {
                self.failed += 1;
                self.failed_ids.push(short_id.to_string());
            }
            DownloadOutcome::TimedOut => {
                self.timed_out += 1;
                self.failed_ids.push(short_id.to_string());
            }
        }
    }

    /// Sort the failed-id list; call once after all outcomes are in.
    pub fn finalize(&mut self) {
        self.failed_ids.sort();
    }

    /// Whether every found record ended as skipped or succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0 && self.degraded.is_none()
    }
}

impl fmt::Display for SourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): found {}, skipped {}, succeeded {}, failed {}, timed out {}",
            self.source,
            self.mid,
            self.found,
            self.skipped,
            self.succeeded,
            self.failed,
            self.timed_out
        )?;
        if self.truncated {
            write!(f, " [truncated]")?;
        }
        if let Some(reason) = &self.degraded {
            write!(f, " [degraded: {reason}]")?;
        }
        Ok(())
    }
}
