//! Signed HTTP client for the listing API
//!
//! One client instance is shared per run. Every request carries the cookie
//! and a (possibly rotated) User-Agent; transport-level failures, 429s and
//! 5xx responses are retried with a jittered, monotonically non-decreasing
//! backoff, while well-formed API error payloads are surfaced unretried.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::downloader::config::retry_backoff;
use crate::fetcher::wire::{NavResponse, NAV_PATH};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::signing::{self, KeyMaterial};
use crate::user_agent::UserAgentPolicy;

/// Referer sent with navigation (key fetch) requests.
const NAV_REFERER: &str = "https://www.bilibili.com/";

/// Referer sent with space listing requests.
pub const SPACE_REFERER: &str = "https://space.bilibili.com/";

/// HTTP client for all listing API interactions.
pub struct ApiClient {
    client: Client,
    api_base: String,
    cookie: Option<String>,
    user_agent: UserAgentPolicy,
    attempt_budget: u32,
}

impl ApiClient {
    /// Build a client from the network configuration.
    ///
    /// `cookie` is attached verbatim to every request when present.
    pub fn new(network: &NetworkConfig, cookie: Option<String>) -> FetcherResult<Arc<Self>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(network.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| FetcherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Arc::new(Self {
            client,
            api_base: network.api_base.trim_end_matches('/').to_string(),
            cookie: cookie.filter(|c| !c.trim().is_empty()),
            user_agent: UserAgentPolicy::new(network.use_random_ua),
            attempt_budget: network.max_retries.max(1),
        }))
    }

    /// The User-Agent policy shared with the download dispatcher.
    pub fn user_agent(&self) -> UserAgentPolicy {
        self.user_agent
    }

    /// Fetch the current WBI key fragments from the navigation endpoint.
    ///
    /// A transport failure, a non-zero payload code or an empty fragment
    /// all abort the source: signing with stale or absent keys always
    /// yields a request the server rejects.
    pub async fn fetch_wbi_keys(&self) -> FetcherResult<KeyMaterial> {
        let nav: NavResponse = self.get_json(NAV_PATH, &[], NAV_REFERER).await?;
        if nav.code != 0 {
            return Err(FetcherError::Api {
                code: nav.code,
                message: nav.message,
            });
        }
        let wbi = nav
            .data
            .ok_or_else(|| FetcherError::Parse("nav response is missing data".to_string()))?
            .wbi_img;

        let img_key = signing::key_from_url(&wbi.img_url)?;
        let sub_key = signing::key_from_url(&wbi.sub_url)?;
        let keys = KeyMaterial::new(img_key, sub_key)?;
        debug!("fetched WBI key fragments");
        Ok(keys)
    }

    /// Execute a GET request against `path` with the given query pairs and
    /// deserialize the JSON response.
    ///
    /// Retries on transport errors, 429 and 5xx, up to the attempt budget;
    /// 4xx responses and body decode failures are terminal.
    pub async fn get_json<T>(
        &self,
        path: &str,
        query: &[(String, String)],
        referer: &str,
    ) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.api_base, path);
        let mut last_error = None;

        for attempt in 0..self.attempt_budget {
            if attempt > 0 {
                let backoff = retry_backoff(attempt - 1);
                debug!(attempt, backoff_ms = backoff.as_millis() as u64, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            let mut request = self
                .client
                .get(&url)
                .query(query)
                .header(reqwest::header::USER_AGENT, self.user_agent.next())
                .header(reqwest::header::REFERER, referer);
            if let Some(cookie) = &self.cookie {
                request = request.header(reqwest::header::COOKIE, cookie);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        budget = self.attempt_budget,
                        error = %e,
                        "transport error"
                    );
                    last_error = Some(FetcherError::Network(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(
                    attempt = attempt + 1,
                    budget = self.attempt_budget,
                    status = %status,
                    "retryable HTTP status"
                );
                last_error = Some(FetcherError::Http(format!("status {status}")));
                continue;
            }
            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(FetcherError::Http(format!("status {status}: {body}")));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| FetcherError::Parse(e.to_string()));
        }

        Err(last_error
            .unwrap_or_else(|| FetcherError::Network("attempt budget exhausted".to_string())))
    }
}
