//! Signed page fetching and incremental crawling
//!
//! [`http::ApiClient`] issues one signed GET per listing page with bounded
//! retry and jittered backoff; [`crawler::SpaceCrawler`] drives it across
//! pages, applies the time-window filter and stops early once results fall
//! outside the window.

use crate::signing::SigningError;

pub mod crawler;
pub mod http;
pub mod wire;

pub use crawler::{CrawlOutcome, CrawlerConfig, SpaceCrawler};
pub use http::ApiClient;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Transport-level failure (timeout, connection reset); retried up to
    /// the attempt budget before escalating
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status that is not worth retrying
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Well-formed API error response (non-zero `code`); terminal, never
    /// retried
    #[error("API error {code}: {message}")]
    Api {
        /// Application-level status code from the payload body
        code: i64,
        /// Human-readable message from the payload body
        message: String,
    },

    /// Key fetch or derivation failed; fatal for the whole source
    #[error("auth error: {0}")]
    Auth(#[from] SigningError),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;
