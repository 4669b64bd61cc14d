//! CSV snapshot writer

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use csv::{Reader, Writer};
use tracing::{debug, info, warn};

use super::{ensure_parent_dir, merge_records, SnapshotError, SnapshotResult};
use crate::VideoRecord;

/// Write `records` to a CSV snapshot at `path`, merging with pre-existing
/// rows and deduplicating by bvid (most recent row wins). Returns the
/// total row count written.
pub fn write_merged(path: &Path, records: &[VideoRecord]) -> SnapshotResult<usize> {
    let existing = if path.exists() {
        match read_all(path) {
            Ok(rows) => rows,
            Err(e) => {
                // A snapshot we cannot parse is replaced rather than
                // aborting the run.
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
    let mut writer = Writer::from_writer(BufWriter::new(file));
    for record in &merged {
        writer
            .serialize(record)
            .map_err(|e| SnapshotError::Csv(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| SnapshotError::Io(e.to_string()))?;

    info!(path = %path.display(), rows = merged.len(), "CSV snapshot written");
    Ok(merged.len())
}

/// Read every row of an existing CSV snapshot.
pub fn read_all(path: &Path) -> SnapshotResult<Vec<VideoRecord>> {
    let mut reader =
        Reader::from_path(path).map_err(|e| SnapshotError::Io(e.to_string()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let record: VideoRecord = row.map_err(|e| SnapshotError::Csv(e.to_string()))?;
        rows.push(record);
    }
    debug!(path = %path.display(), rows = rows.len(), "CSV snapshot read");
    Ok(rows)
}
