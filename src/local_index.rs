//! On-disk presence index
//!
//! Determines whether a discovered item already has a materialized artifact
//! in the target directory. An item is present iff some regular file name
//! contains its short id, the file is non-empty, and it does not carry an
//! in-progress suffix left behind by the downloader.
//!
//! This is a substring heuristic, not a content check: a short id that
//! happens to be a substring of an unrelated filename counts as present,
//! and partially-corrupted files are not detected. Re-downloading after
//! deleting the file is the recovery path.

use std::path::{Path, PathBuf};
use tracing::warn;

/// Extensions that mark a download still in progress.
const IN_PROGRESS_EXTENSIONS: [&str; 4] = ["download", "part", "tmp", "temp"];

/// Presence checks against one scope directory.
#[derive(Debug, Clone)]
pub struct LocalStateIndex {
    dir: PathBuf,
}

impl LocalStateIndex {
    /// Index over `dir`. The directory does not need to exist; a missing
    /// directory simply reports everything as absent.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The scope directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `short_id` already has a materialized artifact.
    pub fn is_present(&self, short_id: &str) -> bool {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if self.dir.exists() {
                    warn!(dir = %self.dir.display(), error = %e, "cannot scan directory");
                }
                return false;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.contains(short_id) {
                continue;
            }
            if is_in_progress(&path) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) if meta.len() > 0 => return true,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "cannot stat file");
                    continue;
                }
            }
        }
        false
    }
}

fn is_in_progress(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IN_PROGRESS_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
