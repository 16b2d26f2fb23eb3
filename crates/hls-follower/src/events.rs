use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

/// Lifecycle phase of a follower session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerPhase {
    /// Resolving master playlists down to a media playlist
    Opening,
    Following,
    /// Last poll saw an unchanged media sequence
    Idle,
    Downloading,
    /// Opening failed
    Failed,
    /// The poll loop exited
    Stopped,
}

#[derive(Debug, Clone)]
pub enum FollowerEvent {
    PhaseChanged(FollowerPhase),
    Opened {
        url: Url,
        media_sequence: u64,
        next_sequence: u64,
    },
    /// A segment present at open time that is not downloaded
    SegmentListed { sequence: u64, uri: String },
    PlaylistRefreshed {
        media_sequence: u64,
        target_duration: u64,
    },
    SegmentSaved {
        sequence: u64,
        uri: String,
        path: PathBuf,
        size: u64,
    },
    /// Segments evicted from the live window before they could be fetched
    GapDetected { missing: Range<u64> },
    StreamEnded,
}

/// Observer for follower events.
pub type OnEvent = Arc<dyn Fn(FollowerEvent) + Send + Sync>;
