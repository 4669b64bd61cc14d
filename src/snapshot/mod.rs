//! Snapshot persistence for discovered records
//!
//! Discovered records are written to a flat snapshot file before dispatch
//! so an interrupted run can be re-driven from disk. Two formats are
//! supported: tabular CSV and line-delimited JSON. When a snapshot already
//! exists at the target path, new rows are merged in and deduplicated by
//! bvid, keeping the most recently written row.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VideoRecord;

pub mod csv;
pub mod jsonl;

/// Snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// CSV encode/decode error
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON encode/decode error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Supported snapshot formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Tabular rows-and-columns CSV
    #[default]
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl SnapshotFormat {
    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Csv => "csv",
            SnapshotFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(SnapshotFormat::Csv),
            "jsonl" | "json" => Ok(SnapshotFormat::Jsonl),
            other => Err(format!("unsupported snapshot format: {other}")),
        }
    }
}

/// Merge `existing` and `incoming`, deduplicating by bvid and keeping the
/// most recently written row at its new position.
pub fn merge_records(existing: Vec<VideoRecord>, incoming: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut slots: Vec<Option<VideoRecord>> = Vec::with_capacity(existing.len() + incoming.len());
    let mut by_bvid: HashMap<String, usize> = HashMap::new();

    for record in existing.into_iter().chain(incoming) {
        if let Some(&slot) = by_bvid.get(&record.bvid) {
            // Later writes win and move to the end.
            slots[slot] = None;
        }
        by_bvid.insert(record.bvid.clone(), slots.len());
        slots.push(Some(record));
    }

    slots.into_iter().flatten().collect()
}

/// Write `records` to `path` in `format`, merging with any pre-existing
/// snapshot at the same path. Returns the total row count written.
pub fn write_snapshot(
    path: &Path,
    records: &[VideoRecord],
    format: SnapshotFormat,
) -> SnapshotResult<usize> {
    match format {
        SnapshotFormat::Csv => csv::write_merged(path, records),
        SnapshotFormat::Jsonl => jsonl::write_merged(path, records),
    }
}

pub(crate) fn ensure_parent_dir(path: &Path) -> SnapshotResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SnapshotError::Io(format!("failed to create directory: {e}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_record(bvid: &str, created: i64) -> VideoRecord {
    VideoRecord {
        bvid: bvid.to_string(),
        aid: 100,
        title: format!("title-{bvid}"),
        description: String::new(),
        author: "someone".to_string(),
        mid: 23_318_408,
        created,
        length: "03:24".to_string(),
        pic: String::new(),
        play: 1,
        comment: 2,
        video_review: 3,
    }
}
