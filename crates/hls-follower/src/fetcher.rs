// Segment fetching: downloads individual media segments with a bounded timeout.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::FollowerError;
use crate::config::FollowerConfig;

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    async fn download_segment(&self, url: &Url) -> Result<Bytes, FollowerError>;
}

pub struct SegmentFetcher {
    http_client: Client,
    config: Arc<FollowerConfig>,
}

impl SegmentFetcher {
    pub fn new(http_client: Client, config: Arc<FollowerConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Fetches a segment, retrying connect/timeout failures, interrupted bodies
    /// and 5xx responses up to `max_segment_retries` extra times.
    async fn fetch_with_retries(&self, segment_url: &Url) -> Result<Bytes, FollowerError> {
        let fetcher_config = &self.config.fetcher_config;
        let fetch_error = |reason: String| FollowerError::SegmentFetch {
            url: segment_url.to_string(),
            reason,
        };

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let failure = match self
                .http_client
                .get(segment_url.clone())
                .timeout(fetcher_config.segment_download_timeout)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    match response.bytes().await {
                        Ok(body) => return Ok(body),
                        Err(e) if is_retryable(&e) => e.to_string(),
                        Err(e) => return Err(fetch_error(e.to_string())),
                    }
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("HTTP {}", response.status())
                }
                // 4xx and friends will not get better by asking again
                Ok(response) => return Err(fetch_error(format!("HTTP {}", response.status()))),
                Err(e) if is_retryable(&e) => e.to_string(),
                Err(e) => return Err(fetch_error(e.to_string())),
            };

            if attempts > fetcher_config.max_segment_retries {
                return Err(fetch_error(if attempts > 1 {
                    format!("{failure} (after {attempts} attempts)")
                } else {
                    failure
                }));
            }

            let delay = fetcher_config.segment_retry_delay_base
                * 2_u32.saturating_pow(attempts.saturating_sub(1));
            warn!(
                url = %segment_url,
                attempt = attempts,
                error = %failure,
                "Segment fetch failed, retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Connect failures, timeouts and interrupted bodies may succeed on a later attempt.
fn is_retryable(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    async fn download_segment(&self, url: &Url) -> Result<Bytes, FollowerError> {
        let downloaded_bytes = self.fetch_with_retries(url).await?;
        debug!(
            "Downloaded {} bytes from segment URL: {}",
            downloaded_bytes.len(),
            url
        );
        Ok(downloaded_bytes)
    }
}
