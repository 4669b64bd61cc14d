//! YAML configuration surface
//!
//! Mirrors the operator-facing config file: `base` (mode, directories),
//! `auth` (cookie), `uploader` (single id or batch list), `time` (window
//! specification), `download`, `network` and `data` sections. The file is
//! discovered in the working directory first, then next to the executable.
//! Loaded once, validated once, then passed into constructors as an
//! immutable value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::downloader::config::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};
use crate::snapshot::SnapshotFormat;
use crate::{TimeWindow, Uploader};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No config file at any searched location
    #[error("config file not found; searched: {0}")]
    NotFound(String),

    /// File exists but could not be read or parsed
    #[error("failed to load config: {0}")]
    Load(String),

    /// Required fields are missing; all of them are listed
    #[error("missing required config fields: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// The time section does not resolve to a valid window
    #[error("invalid time window: {0}")]
    InvalidWindow(String),
}

/// Run mode: one uploader or a configured batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One uploader, taken from `uploader.single_mid`
    Single,
    /// Every uploader in `uploader.batch_list`, sequentially
    #[default]
    Batch,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mode and directories
    pub base: BaseConfig,
    /// Upstream authentication
    pub auth: AuthConfig,
    /// Which uploaders to process
    pub uploader: UploaderConfig,
    /// Time-window specification
    pub time: TimeConfig,
    /// Download dispatch settings
    pub download: DownloadConfig,
    /// HTTP and crawl settings
    pub network: NetworkConfig,
    /// Snapshot settings
    pub data: DataConfig,
}

/// Mode and directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    /// Run mode
    pub mode: RunMode,
    /// Directory for snapshot files
    pub data_dir: PathBuf,
    /// Root directory for downloads; per-uploader folders go underneath
    pub download_dir: PathBuf,
    /// Log level when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            data_dir: PathBuf::from("./data"),
            download_dir: PathBuf::from("./downloads"),
            log_level: "info".to_string(),
        }
    }
}

/// Upstream authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie string sent with every listing request; required
    pub cookie: String,
}

/// Which uploaders to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Space id for single mode
    pub single_mid: Option<String>,
    /// Display name to space id, for batch mode
    pub batch_list: BTreeMap<String, String>,
}

/// Time-window specification.
///
/// Resolution order: absolute timestamps, then an explicit date range,
/// then the per-mode default (unbounded for single mode, a rolling window
/// for batch mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// `YYYY-MM-DD` start date
    pub start_date: Option<String>,
    /// `YYYY-MM-DD` end date; defaults to now
    pub end_date: Option<String>,
    /// Absolute start timestamp (seconds); takes precedence when set
    pub start_timestamp: Option<i64>,
    /// Absolute end timestamp (seconds); defaults to now
    pub end_timestamp: Option<i64>,
    /// Rolling window length in days for batch mode
    pub batch_time_range_days: u32,
    /// Rolling window length in hours; overrides the day-based window
    pub batch_time_range_hours: Option<u32>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            start_timestamp: None,
            end_timestamp: None,
            batch_time_range_days: 7,
            batch_time_range_hours: None,
        }
    }
}

/// Download dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Whether to dispatch downloads at all (false = scan only)
    pub enabled: bool,
    /// Whether to skip items already present on disk
    pub check_downloaded: bool,
    /// Worker-pool size
    pub max_workers: usize,
    /// Hard wall-clock timeout per download, in seconds
    pub timeout_secs: u64,
    /// External downloader executable
    pub command: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_downloaded: true,
            max_workers: DEFAULT_CONCURRENCY,
            timeout_secs: 3_600,
            command: "bbdown".to_string(),
        }
    }
}

/// HTTP and crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Rotate the User-Agent patch digit per request
    pub use_random_ua: bool,
    /// Delay between page requests, in milliseconds
    pub delay_ms: u64,
    /// Hard cap on pages fetched per source
    pub max_pages: u32,
    /// Entries requested per page
    pub page_size: u32,
    /// HTTP request timeout, in seconds
    pub timeout_secs: u64,
    /// Base URL of the listing API
    pub api_base: String,
    /// Attempt budget for each page fetch
    pub max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_random_ua: true,
            delay_ms: 500,
            max_pages: 100,
            page_size: 50,
            timeout_secs: 10,
            api_base: "https://api.bilibili.com".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Snapshot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Snapshot format
    pub format: SnapshotFormat,
    /// Fixed snapshot path; defaults to a dated file under `data_dir`
    pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load a config file.
    ///
    /// Relative paths are searched in the working directory first, then in
    /// the directory containing the executable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let resolved = if path.is_absolute() {
            path.exists().then(|| path.to_path_buf())
        } else {
            find_config_file(path)
        };
        let resolved = resolved.ok_or_else(|| {
            ConfigError::NotFound(format!(
                "{} (working directory and executable directory)",
                path.display()
            ))
        })?;

        let text = std::fs::read_to_string(&resolved)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", resolved.display())))?;
        let config: AppConfig = serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", resolved.display())))?;
        info!(path = %resolved.display(), "config loaded");
        Ok(config)
    }

    /// Parse a config from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Serialize the config back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate every required field, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        if self.auth.cookie.trim().is_empty() {
            missing.push("auth.cookie".to_string());
        }
        match self.base.mode {
            RunMode::Single => {
                if self
                    .uploader
                    .single_mid
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .is_empty()
                {
                    missing.push("uploader.single_mid".to_string());
                }
            }
            RunMode::Batch => {
                if self.uploader.batch_list.is_empty() {
                    missing.push("uploader.batch_list".to_string());
                }
            }
        }
        if self.base.download_dir.as_os_str().is_empty() {
            missing.push("base.download_dir".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    /// Resolve the time section into a concrete window.
    pub fn time_window(&self) -> Result<TimeWindow, ConfigError> {
        if let Some(start) = self.time.start_timestamp {
            return TimeWindow::from_timestamps(start, self.time.end_timestamp)
                .map_err(ConfigError::InvalidWindow);
        }
        if let Some(start_date) = self.time.start_date.as_deref() {
            return TimeWindow::from_date_range(start_date, self.time.end_date.as_deref())
                .map_err(ConfigError::InvalidWindow);
        }
        Ok(match self.base.mode {
            RunMode::Single => TimeWindow::unbounded(),
            RunMode::Batch => match self.time.batch_time_range_hours {
                Some(hours) => TimeWindow::from_hours(hours),
                None => TimeWindow::from_days(self.time.batch_time_range_days),
            },
        })
    }

    /// The uploader list for the configured mode.
    pub fn uploaders(&self) -> Vec<Uploader> {
        match self.base.mode {
            RunMode::Single => self
                .uploader
                .single_mid
                .iter()
                .map(|mid| Uploader::new(format!("UP-{mid}"), mid.clone()))
                .collect(),
            RunMode::Batch => self
                .uploader
                .batch_list
                .iter()
                .map(|(name, mid)| Uploader::new(name.clone(), mid.clone()))
                .collect(),
        }
    }

    /// Delay between page requests.
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.network.delay_ms)
    }

    /// Delay between sources in batch mode (twice the page delay).
    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.network.delay_ms.saturating_mul(2))
    }

    /// Snapshot path for one uploader: the configured fixed path, or a
    /// dated per-mid file under `data_dir`.
    pub fn snapshot_path(&self, mid: &str) -> PathBuf {
        if let Some(path) = &self.data.snapshot_path {
            return path.clone();
        }
        let date = chrono::Local::now().format("%Y%m%d");
        self.base.data_dir.join(format!(
            "bilibili_videos_{mid}_{date}.{}",
            self.data.format.extension()
        ))
    }
}

fn find_config_file(name: &Path) -> Option<PathBuf> {
    let cwd_candidate = std::env::current_dir().ok().map(|d| d.join(name));
    if let Some(candidate) = cwd_candidate {
        if candidate.exists() {
            return Some(candidate);
        }
    }
    let exe_candidate = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|d| d.join(name)));
    exe_candidate.filter(|candidate| candidate.exists())
}
