//! # Configuration builders
//!
//! Fluent builders for [`DownloaderConfig`] and [`FollowerConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hls_follower::{DownloaderConfig, FollowerConfig, RestartPolicy};
//!
//! let http = DownloaderConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_user_agent("MyRecorder/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//!
//! let config = FollowerConfig::builder()
//!     .with_base_config(http)
//!     .output_dir("./segments")
//!     .restart_policy(RestartPolicy::Fixed(Duration::from_secs(10)))
//!     .build();
//! assert_eq!(config.storage_config.output_dir.to_str(), Some("./segments"));
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{
    DownloaderConfig, FollowerConfig, InitialSegmentPolicy, RestartPolicy, VariantSelectionPolicy,
};
use crate::proxy::ProxyConfig;

/// Builder for [`DownloaderConfig`]
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Set the overall timeout for a single HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Merge headers over the defaults
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.merge_headers(&headers);
        self
    }

    /// Set an explicit proxy. This disables the system proxy.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    /// Only takes effect when no explicit proxy is configured
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`FollowerConfig`]
#[derive(Debug, Clone, Default)]
pub struct FollowerConfigBuilder {
    config: FollowerConfig,
}

impl FollowerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_config(mut self, base: DownloaderConfig) -> Self {
        self.config.base = base;
        self
    }

    pub fn playlist_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.playlist_config.playlist_fetch_timeout = timeout;
        self
    }

    pub fn max_variant_depth(mut self, depth: u32) -> Self {
        self.config.playlist_config.max_variant_depth = depth;
        self
    }

    pub fn variant_selection_policy(mut self, policy: VariantSelectionPolicy) -> Self {
        self.config.playlist_config.variant_selection_policy = policy;
        self
    }

    pub fn initial_segment_policy(mut self, policy: InitialSegmentPolicy) -> Self {
        self.config.playlist_config.initial_segment_policy = policy;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.config.poll_config.idle_interval = interval;
        self
    }

    /// Poll at a fixed interval instead of `target_duration - 1s`
    pub fn poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.poll_config.poll_interval = interval;
        self
    }

    pub fn segment_download_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    pub fn segment_retry_count(mut self, retries: u32) -> Self {
        self.config.fetcher_config.max_segment_retries = retries;
        self
    }

    /// Base delay of the exponential backoff between segment retries
    pub fn segment_retry_delay(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay_base = delay;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_config.output_dir = dir.into();
        self
    }

    pub fn write_retries(mut self, retries: u32) -> Self {
        self.config.storage_config.write_retries = retries;
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.config.restart_config.policy = policy;
        self
    }

    pub fn max_restarts(mut self, max_restarts: Option<u32>) -> Self {
        self.config.restart_config.max_restarts = max_restarts;
        self
    }

    pub fn build(self) -> FollowerConfig {
        self.config
    }
}
