//! Dispatch and retry constants

use rand::Rng;
use std::time::Duration;

/// Default attempt budget for page fetches.
/// 3 attempts rides out transient transport failures without stalling the
/// crawl for minutes on a dead upstream.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Maximum random jitter added to each backoff step, in milliseconds.
pub const BACKOFF_JITTER_MS: u64 = 250;

/// Default worker-pool size for download dispatch.
/// Deliberately conservative: the external downloader saturates bandwidth
/// per job and the upstream throttles aggressive clients.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default hard wall-clock timeout per download.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3_600);

/// Backoff before retry attempt `retry_count` (0-indexed).
///
/// Exponential with a small random jitter; the deterministic part is
/// monotonically non-decreasing in `retry_count` and capped at
/// [`MAX_BACKOFF_MS`].
pub fn retry_backoff(retry_count: u32) -> Duration {
    let base = INITIAL_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(retry_count))
        .min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(base + jitter)
}
