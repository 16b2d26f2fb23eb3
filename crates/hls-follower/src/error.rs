use std::path::PathBuf;
use std::sync::Arc;

/// Errors produced while following a live playlist.
///
/// Every variant ends the current follower session. A sequence gap is not an
/// error; it is reported through [`crate::FollowerEvent::GapDetected`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum FollowerError {
    #[error("Failed to open playlist {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("Failed to fetch playlist {url}: {reason}")]
    PlaylistFetch { url: String, reason: String },

    #[error("Failed to fetch segment {url}: {reason}")]
    SegmentFetch { url: String, reason: String },

    #[error("Playlist error: {0}")]
    PlaylistParse(String),

    #[error("Failed to write segment {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("Invalid segment path: {0}")]
    InvalidSegmentPath(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Media sequence went backwards from {previous} to {current}")]
    SequenceRegressed { previous: u64, current: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FollowerError {
    /// Wraps any error raised while opening a playlist into [`FollowerError::Open`].
    pub fn into_open(self, url: impl Into<String>) -> Self {
        match self {
            err @ FollowerError::Open { .. } => err,
            other => FollowerError::Open {
                url: url.into(),
                reason: other.to_string(),
            },
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FollowerError::StorageWrite {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    #[inline]
    pub fn is_open_error(&self) -> bool {
        matches!(self, FollowerError::Open { .. })
    }

    /// Playlist or segment fetch failure during steady-state polling.
    #[inline]
    pub fn is_transient_fetch(&self) -> bool {
        matches!(
            self,
            FollowerError::PlaylistFetch { .. } | FollowerError::SegmentFetch { .. }
        )
    }

    #[inline]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            FollowerError::StorageWrite { .. } | FollowerError::InvalidSegmentPath(_)
        )
    }
}
