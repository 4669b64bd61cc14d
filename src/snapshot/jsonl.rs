//! JSON-lines snapshot writer

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use super::{ensure_parent_dir, merge_records, SnapshotError, SnapshotResult};
use crate::VideoRecord;

/// Write `records` to a JSON-lines snapshot at `path`, merging with
/// pre-existing rows and deduplicating by bvid (most recent row wins).
/// Returns the total row count written.
pub fn write_merged(path: &Path, records: &[VideoRecord]) -> SnapshotResult<usize> {
    let existing = if path.exists() {
        match read_all(path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable snapshot");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let merged = merge_records(existing, records.to_vec());

    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| SnapshotError::Io(format!("failed to create file: {e}")))?;
    let mut writer = BufWriter::new(file);
    for record in &merged {
        let line = serde_json::to_string(record)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| SnapshotError::Io(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| SnapshotError::Io(e.to_string()))?;

    info!(path = %path.display(), rows = merged.len(), "JSONL snapshot written");
    Ok(merged.len())
}

/// Read every row of an existing JSON-lines snapshot.
pub fn read_all(path: &Path) -> SnapshotResult<Vec<VideoRecord>> {
    let file = File::open(path).map_err(|e| SnapshotError::Io(e.to_string()))?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| SnapshotError::Io(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: VideoRecord = serde_json::from_str(&line)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        rows.push(record);
    }
    Ok(rows)
}
