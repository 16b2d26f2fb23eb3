use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;

const DEFAULT_USER_AGENT: &str = concat!("hls-follower/", env!("CARGO_PKG_VERSION"));

/// HTTP client options shared by playlist and segment requests
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request (zero disables it)
    pub timeout: Duration,

    /// Time allowed to establish a connection
    pub connect_timeout: Duration,

    /// Idle timeout for pooled connections
    pub read_timeout: Duration,

    pub follow_redirects: bool,

    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,

    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings when no explicit proxy is set
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static(
                "application/vnd.apple.mpegurl,application/x-mpegurl,video/mp2t,*/*;q=0.8",
            ),
        );
        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers
    }

    /// Merge custom headers over the defaults. Custom values replace every
    /// existing value of the same name; repeated custom values are all kept.
    pub fn merge_headers(&mut self, custom: &HeaderMap) {
        for name in custom.keys() {
            self.headers.remove(name);
        }
        for (name, value) in custom.iter() {
            self.headers.append(name.clone(), value.clone());
        }
    }
}

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct FollowerConfig {
    pub base: DownloaderConfig,
    pub playlist_config: PlaylistConfig,
    pub poll_config: PollConfig,
    pub fetcher_config: FetcherConfig,
    pub storage_config: StorageConfig,
    pub restart_config: RestartConfig,
}

impl FollowerConfig {
    pub fn builder() -> crate::builder::FollowerConfigBuilder {
        crate::builder::FollowerConfigBuilder::new()
    }
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct PlaylistConfig {
    pub playlist_fetch_timeout: Duration,
    /// Maximum number of master playlists followed before giving up
    pub max_variant_depth: u32,
    pub variant_selection_policy: VariantSelectionPolicy,
    pub initial_segment_policy: InitialSegmentPolicy,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(15),
            max_variant_depth: 5,
            variant_selection_policy: VariantSelectionPolicy::default(),
            initial_segment_policy: InitialSegmentPolicy::default(),
        }
    }
}

/// Which sub-playlist of a master playlist gets followed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantSelectionPolicy {
    /// The first listed rendition
    #[default]
    First,
    HighestBitrate,
    LowestBitrate,
}

impl std::str::FromStr for VariantSelectionPolicy {
    type Err = crate::FollowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(VariantSelectionPolicy::First),
            "highest" | "highest-bitrate" => Ok(VariantSelectionPolicy::HighestBitrate),
            "lowest" | "lowest-bitrate" => Ok(VariantSelectionPolicy::LowestBitrate),
            other => Err(crate::FollowerError::ConfigError(format!(
                "Unknown variant selection policy '{other}'"
            ))),
        }
    }
}

/// What to do with the segments already listed when a playlist is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialSegmentPolicy {
    /// Enumerate them and only download segments published afterwards
    #[default]
    SkipExisting,
    /// Download the current window right away
    DownloadExisting,
}

// --- Poll Configuration ---
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait after a poll that saw an unchanged media sequence
    pub idle_interval: Duration,
    /// Replaces the `target_duration - 1s` wait after a refreshed playlist
    pub poll_interval: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            poll_interval: None,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub segment_download_timeout: Duration,
    /// Extra attempts for a segment after the first one fails (0 = single attempt)
    pub max_segment_retries: u32,
    pub segment_retry_delay_base: Duration, // Base for exponential backoff
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            segment_download_timeout: Duration::from_secs(30),
            max_segment_retries: 0,
            segment_retry_delay_base: Duration::from_millis(500),
        }
    }
}

// --- Storage Configuration ---
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory segments are written under
    pub output_dir: PathBuf,
    /// Extra attempts for a failed segment write
    pub write_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            write_retries: 1,
        }
    }
}

// --- Restart Configuration ---
#[derive(Debug, Clone)]
pub struct RestartConfig {
    pub policy: RestartPolicy,
    /// Upper bound on session restarts; `None` restarts forever
    pub max_restarts: Option<u32>,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            policy: RestartPolicy::default(),
            max_restarts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Same delay before every restart
    Fixed(Duration),
    /// Delay doubles for each consecutive failure to open, up to `max`
    ExponentialBackoff { initial: Duration, max: Duration },
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::Fixed(Duration::from_secs(5))
    }
}

impl RestartPolicy {
    /// Delay before the restart following `consecutive_failures` failed openings.
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        match *self {
            RestartPolicy::Fixed(delay) => delay,
            RestartPolicy::ExponentialBackoff { initial, max } => {
                let exponent = consecutive_failures.saturating_sub(1).min(16);
                initial.saturating_mul(1 << exponent).min(max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FollowerConfig::default();
        assert_eq!(config.poll_config.idle_interval, Duration::from_secs(1));
        assert!(config.poll_config.poll_interval.is_none());
        assert_eq!(config.fetcher_config.max_segment_retries, 0);
        assert_eq!(config.storage_config.write_retries, 1);
        assert_eq!(
            config.playlist_config.variant_selection_policy,
            VariantSelectionPolicy::First
        );
        assert_eq!(
            config.playlist_config.initial_segment_policy,
            InitialSegmentPolicy::SkipExisting
        );
        assert_eq!(
            config.restart_config.policy,
            RestartPolicy::Fixed(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_fixed_restart_delay() {
        let policy = RestartPolicy::Fixed(Duration::from_secs(3));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let policy = RestartPolicy::ExponentialBackoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_variant_policy() {
        assert_eq!(
            "highest".parse::<VariantSelectionPolicy>().unwrap(),
            VariantSelectionPolicy::HighestBitrate
        );
        assert_eq!(
            "First".parse::<VariantSelectionPolicy>().unwrap(),
            VariantSelectionPolicy::First
        );
        assert!("middle".parse::<VariantSelectionPolicy>().is_err());
    }

    #[test]
    fn test_merge_headers_overrides_defaults() {
        let mut config = DownloaderConfig::default();
        let mut custom = HeaderMap::new();
        custom.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        config.merge_headers(&custom);
        assert_eq!(config.headers.get(reqwest::header::ACCEPT).unwrap(), "*/*");
        assert!(config.headers.contains_key(reqwest::header::CONNECTION));
    }
}
