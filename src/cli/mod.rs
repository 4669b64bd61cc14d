//! CLI command implementations

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::config::{AppConfig, RunMode};
use crate::orchestrator::Orchestrator;

pub mod error;

pub use error::CliError;

/// Incremental crawler and batch downloader for Bilibili uploader spaces.
#[derive(Parser, Debug)]
#[command(name = "bili-space-downloader", version, about)]
pub struct Cli {
    /// Config file path; relative paths are searched in the working
    /// directory, then next to the executable
    #[arg(short, long, global = true, default_value = "bili-config.yaml")]
    pub config: PathBuf,

    /// What to do
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl configured sources and download new videos
    Run(RunArgs),
    /// Crawl and persist snapshots only, without downloading
    Scan(RunArgs),
    /// Load and validate the config file
    Validate,
    /// Write a default config file
    GenerateConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Config overrides shared by `run` and `scan`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Process a single uploader by space id (switches to single mode)
    #[arg(long)]
    pub mid: Option<String>,

    /// Override the download directory
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Override the page cap per source
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Override the download worker-pool size
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Override the inter-page delay in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Restrict the window to uploads since this date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Restrict the window to the last N days
    #[arg(long)]
    pub days: Option<u32>,

    /// Do not skip items already present on disk
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    /// Fold the CLI overrides into a loaded config.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(mid) = &self.mid {
            config.base.mode = RunMode::Single;
            config.uploader.single_mid = Some(mid.clone());
            info!(mid = %mid, "CLI override: single uploader");
        }
        if let Some(dir) = &self.download_dir {
            config.base.download_dir = dir.clone();
        }
        if let Some(max_pages) = self.max_pages {
            config.network.max_pages = max_pages;
        }
        if let Some(max_workers) = self.max_workers {
            config.download.max_workers = max_workers;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.network.delay_ms = delay_ms;
        }
        if let Some(start_date) = &self.start_date {
            config.time.start_date = Some(start_date.clone());
            config.time.start_timestamp = None;
        }
        if let Some(days) = self.days {
            config.time.start_date = None;
            config.time.start_timestamp = None;
            config.time.batch_time_range_hours = None;
            config.time.batch_time_range_days = days;
        }
        if self.force {
            config.download.check_downloaded = false;
        }
    }

    /// Load the config, apply overrides and run; `download` selects
    /// between the full run and a scan-only run.
    pub async fn execute(&self, config_path: &PathBuf, download: bool) -> Result<(), CliError> {
        let mut config = AppConfig::load(config_path)?;
        self.apply_to(&mut config);
        config.download.enabled = download && config.download.enabled;
        config.validate()?;

        let orchestrator = Orchestrator::new(config)?;
        let summary = orchestrator.run().await;

        println!();
        println!("Run finished in {}s", summary.elapsed.as_secs());
        for report in &summary.reports {
            println!("  {report}");
            if !report.failed_ids.is_empty() {
                println!("    failed: {}", report.failed_ids.join(", "));
            }
        }
        Ok(())
    }
}

/// Execute the `validate` subcommand.
pub fn execute_validate(config_path: &PathBuf) -> Result<(), CliError> {
    let config = AppConfig::load(config_path)?;
    config.validate()?;
    let window = config.time_window()?;

    println!("Config OK");
    println!("  mode: {:?}", config.base.mode);
    println!("  sources: {}", config.uploaders().len());
    println!("  window: {window}");
    println!("  download dir: {}", config.base.download_dir.display());
    Ok(())
}

/// Execute the `generate-config` subcommand.
pub fn execute_generate_config(config_path: &PathBuf, force: bool) -> Result<(), CliError> {
    if config_path.exists() && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }
    let text = AppConfig::default().to_yaml()?;
    std::fs::write(config_path, text)?;
    println!("Default config written to {}", config_path.display());
    println!("Set auth.cookie and the uploader list before running.");
    Ok(())
}
