//! # Bilibili Space Downloader Library
//!
//! A library for incrementally crawling the video catalog of Bilibili
//! uploaders ("spaces") and batch-downloading new uploads through an
//! external downloader.
//!
//! ## Features
//!
//! - **WBI request signing**: derives the rotating mixin key and signs
//!   every listing request the way the web client does
//! - **Incremental crawling**: walks the paginated space listing under a
//!   time window and stops early once results fall out of the window
//! - **Idempotent downloads**: items that already have a materialized file
//!   in the target directory are skipped, so re-running a failed batch is
//!   the recovery path
//! - **Bounded concurrency**: downloads run in a fixed-size worker pool
//!   with a hard per-download timeout
//! - **Flat snapshots**: discovered records are persisted to CSV or
//!   JSON-lines files, deduplicated by bvid
//!
//! ## Quick Start
//!
//! ```no_run
//! use bili_space_downloader::config::AppConfig;
//! use bili_space_downloader::orchestrator::Orchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("bili-config.yaml")?;
//! config.validate()?;
//!
//! let orchestrator = Orchestrator::new(config)?;
//! let summary = orchestrator.run().await;
//! for report in &summary.reports {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`signing`] - WBI key material and request signature derivation
//! - [`fetcher`] - Signed HTTP page fetching and the incremental crawler
//! - [`local_index`] - On-disk presence checks for already-downloaded items
//! - [`downloader`] - Bounded-concurrency dispatch to the external downloader
//! - [`snapshot`] - Tabular and line-delimited snapshot persistence
//! - [`orchestrator`] - Per-source sequencing of crawl, snapshot and dispatch
//! - [`config`] - YAML configuration surface consumed by the above

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// YAML configuration loading and validation
pub mod config;

/// Download dispatch to the external downloader
pub mod downloader;

/// Signed page fetching and incremental crawling
pub mod fetcher;

/// On-disk presence index for downloaded items
pub mod local_index;

/// Per-source run sequencing
pub mod orchestrator;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// WBI request signing
pub mod signing;

/// Snapshot persistence for discovered records
pub mod snapshot;

/// User-Agent selection policy
pub mod user_agent;

// Re-export commonly used types
pub use signing::KeyMaterial;

/// One discovered remote video.
///
/// Created by parsing a single listing-page entry and immutable afterwards.
/// Identity is the [`bvid`](VideoRecord::bvid) short id, which is also the
/// token used to match files on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    /// Short id, e.g. `BV1xx411c7mD`; unique within one uploader's catalog
    pub bvid: String,
    /// Internal numeric id
    pub aid: i64,
    /// Video title
    pub title: String,
    /// Description text
    #[serde(default)]
    pub description: String,
    /// Uploader display name
    #[serde(default)]
    pub author: String,
    /// Uploader numeric id
    pub mid: i64,
    /// Creation time (Unix timestamp, seconds)
    pub created: i64,
    /// Duration as reported by the API, e.g. `12:34`
    #[serde(default)]
    pub length: String,
    /// Cover picture URL
    #[serde(default)]
    pub pic: String,
    /// Play count
    #[serde(default)]
    pub play: i64,
    /// Comment count
    #[serde(default)]
    pub comment: i64,
    /// Danmaku count
    #[serde(default)]
    pub video_review: i64,
}

/// One uploader to process: a display name (used for the per-source
/// download folder) plus the numeric space id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    /// Display name from configuration
    pub name: String,
    /// Space id (`mid` query parameter)
    pub mid: String,
}

impl Uploader {
    /// Create a new uploader entry.
    pub fn new(name: impl Into<String>, mid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mid: mid.into(),
        }
    }

    /// Folder name for this uploader's downloads, e.g. `Bili-somebody`.
    pub fn folder_name(&self) -> String {
        format!("Bili-{}", self.name)
    }
}

/// How a [`TimeWindow`] was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Rolling window of whole days back from now, anchored at local midnight
    Days,
    /// Rolling window of hours back from now
    Hours,
    /// Explicit `YYYY-MM-DD` date range
    DateRange,
    /// Absolute Unix timestamps
    Timestamp,
    /// Everything since the epoch
    Unbounded,
}

/// A closed interval `[start, end]` of Unix timestamps.
///
/// A record is in-window iff `start <= created <= end`; both boundaries are
/// included. `start <= end` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive lower bound (Unix timestamp, seconds)
    pub start: i64,
    /// Inclusive upper bound (Unix timestamp, seconds)
    pub end: i64,
    /// How this window was derived
    pub mode: WindowMode,
}

impl TimeWindow {
    /// Window covering the last `days` days, starting at local midnight
    /// `days` days ago and ending now.
    pub fn from_days(days: u32) -> Self {
        let now = Local::now();
        let start_day = now.date_naive() - chrono::Duration::days(i64::from(days));
        let start = Local
            .from_local_datetime(&start_day.and_hms_opt(0, 0, 0).expect("midnight is valid"))
            .earliest()
            .map(|dt| dt.timestamp())
            .unwrap_or(0);
        Self {
            start,
            end: now.timestamp(),
            mode: WindowMode::Days,
        }
    }

    /// Window covering the last `hours` hours, ending now.
    pub fn from_hours(hours: u32) -> Self {
        let now = Local::now().timestamp();
        Self {
            start: now - i64::from(hours) * 3600,
            end: now,
            mode: WindowMode::Hours,
        }
    }

    /// Window from a `YYYY-MM-DD` start date (at local midnight) to an
    /// optional `YYYY-MM-DD` end date (at 23:59:59), defaulting to now.
    pub fn from_date_range(start_date: &str, end_date: Option<&str>) -> Result<Self, String> {
        let start = parse_local_date(start_date, 0, 0, 0)?;
        let end = match end_date {
            Some(d) => parse_local_date(d, 23, 59, 59)?,
            None => Local::now().timestamp(),
        };
        if start > end {
            return Err(format!("window start ({start_date}) is after window end"));
        }
        Ok(Self {
            start,
            end,
            mode: WindowMode::DateRange,
        })
    }

    /// Window from absolute Unix timestamps; `end` defaults to now.
    pub fn from_timestamps(start: i64, end: Option<i64>) -> Result<Self, String> {
        let end = end.unwrap_or_else(|| Local::now().timestamp());
        if start > end {
            return Err(format!(
                "window start ({start}) is after window end ({end})"
            ));
        }
        Ok(Self {
            start,
            end,
            mode: WindowMode::Timestamp,
        })
    }

    /// Window covering everything from the epoch to now.
    pub fn unbounded() -> Self {
        Self {
            start: 0,
            end: Local::now().timestamp(),
            mode: WindowMode::Unbounded,
        }
    }

    /// Whether `timestamp` falls inside the window (boundaries included).
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_ts = |ts: i64| {
            Local
                .timestamp_opt(ts, 0)
                .earliest()
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| ts.to_string())
        };
        write!(
            f,
            "TimeWindow({:?}: {} -> {})",
            self.mode,
            fmt_ts(self.start),
            fmt_ts(self.end)
        )
    }
}

fn parse_local_date(date: &str, h: u32, m: u32, s: u32) -> Result<i64, String> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{date}': {e}"))?;
    let dt = day
        .and_hms_opt(h, m, s)
        .ok_or_else(|| format!("invalid time of day for '{date}'"))?;
    Local
        .from_local_datetime(&dt)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| format!("date '{date}' is not representable in the local timezone"))
}
