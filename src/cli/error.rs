//! CLI error types and conversions

use crate::config::ConfigError;
use crate::fetcher::FetcherError;
use crate::orchestrator::OrchestratorError;
use crate::signing::SigningError;
use crate::snapshot::SnapshotError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Orchestrator setup error
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Signing error
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// Snapshot error
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
