//! Download dispatch
//!
//! This module owns the only parallel region of a run: a fixed-size worker
//! pool that shells out to the external downloader for each item the local
//! index reports as missing.
//!
//! # Overview
//!
//! 1. **Skip filter**: records are checked against
//!    [`crate::local_index::LocalStateIndex`] first
//! 2. **Dispatch**: the remainder runs through
//!    [`dispatcher::DownloadDispatcher`] with bounded concurrency
//! 3. **Classification**: each invocation ends as succeeded, failed or
//!    timed-out ([`report::DownloadOutcome`])
//! 4. **Aggregation**: outcomes flow through a single collector channel
//!    into a [`report::SourceReport`]
//!
//! Workers are independent: one failure never cancels siblings, and the
//! dispatcher itself never retries. Re-running the batch is the recovery
//! path, relying on the skip filter for items that already succeeded.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod report;

pub use command::{BbdownCommand, DownloadStatus, VideoDownloader};
pub use dispatcher::{DispatcherConfig, DownloadDispatcher};
pub use report::{DownloadOutcome, SourceReport};
