//! # hls-follower
//!
//! Follows live HLS playlists and downloads each newly published media
//! segment exactly once, in sequence order, to local storage.
//!
//! ## Features
//!
//! - Master playlist resolution with selectable variant policy
//! - Gap detection and resynchronisation when the live window outruns the poller
//! - Atomic segment writes (`.part` file then rename)
//! - Session restarts with fixed or exponential backoff
//! - One-shot preloading of every rendition

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod follower;
pub mod playlist;
pub mod preload;
pub mod proxy;
pub mod storage;
pub mod supervisor;

#[cfg(test)]
mod test_utils;

pub use builder::{DownloaderConfigBuilder, FollowerConfigBuilder};
pub use client::create_client;
pub use config::{
    DownloaderConfig, FetcherConfig, FollowerConfig, InitialSegmentPolicy, PlaylistConfig,
    PollConfig, RestartConfig, RestartPolicy, StorageConfig, VariantSelectionPolicy,
};
pub use error::FollowerError;
pub use events::{FollowerEvent, FollowerPhase, OnEvent};
pub use fetcher::{SegmentDownloader, SegmentFetcher};
pub use follower::{
    FollowerState, PlaylistFollower, PollOutcome, PollResult, SavedSegment, SessionEnd,
};
pub use playlist::{HttpPlaylistLoader, Playlist, PlaylistProvider, Segment, VariantStream};
pub use preload::PreloadReport;
pub use storage::{FileSegmentStore, SegmentStore};
pub use supervisor::Supervisor;

// Re-export proxy utilities
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
