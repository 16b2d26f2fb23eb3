//! # Playlist follower
//!
//! Keeps up with a live media playlist and downloads every newly published
//! segment exactly once, in ascending sequence order.
//!
//! A session is `open` (resolve master playlists, initialise sequence
//! tracking) followed by `follow` (poll until cancelled, ended or failed).
//! Errors end the session; restarting is the job of [`crate::Supervisor`].

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::client::create_client;
use crate::config::{FollowerConfig, InitialSegmentPolicy, PollConfig};
use crate::events::{FollowerEvent, FollowerPhase, OnEvent};
use crate::fetcher::{SegmentDownloader, SegmentFetcher};
use crate::playlist::{HttpPlaylistLoader, Playlist, PlaylistProvider, resolve_media_playlist};
use crate::storage::{FileSegmentStore, SegmentStore};
use crate::FollowerError;

/// Sequence tracking for one followed media playlist.
///
/// `next_expected_sequence >= last_seen_media_sequence` holds after `open`
/// and neither value decreases during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerState {
    /// The resolved media playlist URL
    pub url: Url,
    pub last_seen_media_sequence: u64,
    pub next_expected_sequence: u64,
}

impl FollowerState {
    pub fn new(url: Url, media_sequence: u64) -> Self {
        Self {
            url,
            last_seen_media_sequence: media_sequence,
            next_expected_sequence: media_sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSegment {
    pub sequence: u64,
    pub uri: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Media sequence unchanged since the previous poll
    Idle,
    Refreshed {
        gap: Option<Range<u64>>,
        saved: Vec<SavedSegment>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub outcome: PollOutcome,
    pub target_duration: u64,
    pub end_list: bool,
}

impl PollResult {
    /// How long to wait before the next poll.
    ///
    /// A refreshed playlist waits `target_duration - 1` seconds (never below
    /// zero) unless a fixed poll interval is configured. There is no drift
    /// correction.
    pub fn next_wait(&self, poll_config: &PollConfig) -> Duration {
        match self.outcome {
            PollOutcome::Idle => poll_config.idle_interval,
            PollOutcome::Refreshed { .. } => poll_config
                .poll_interval
                .unwrap_or_else(|| Duration::from_secs(self.target_duration.saturating_sub(1))),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.outcome, PollOutcome::Idle)
    }
}

/// Why a session stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    /// The playlist carried `#EXT-X-ENDLIST`
    EndOfStream,
}

/// Result of one session plus whether `open` completed before it ended
#[derive(Debug)]
pub(crate) struct SessionOutcome {
    pub opened: bool,
    pub result: Result<SessionEnd, FollowerError>,
}

pub struct PlaylistFollower {
    pub(crate) playlists: Arc<dyn PlaylistProvider>,
    pub(crate) downloader: Arc<dyn SegmentDownloader>,
    pub(crate) store: Arc<dyn SegmentStore>,
    pub(crate) config: Arc<FollowerConfig>,
    on_event: Option<OnEvent>,
}

impl PlaylistFollower {
    /// Create a follower that fetches over HTTP and writes segments under
    /// `config.storage_config.output_dir`.
    pub fn new(config: FollowerConfig) -> Result<Self, FollowerError> {
        let config = Arc::new(config);
        let http_client = create_client(&config.base)?;

        let playlists: Arc<dyn PlaylistProvider> = Arc::new(HttpPlaylistLoader::new(
            http_client.clone(),
            Arc::clone(&config),
        ));
        let downloader: Arc<dyn SegmentDownloader> =
            Arc::new(SegmentFetcher::new(http_client, Arc::clone(&config)));
        let store: Arc<dyn SegmentStore> = Arc::new(FileSegmentStore::new(
            config.storage_config.output_dir.clone(),
            config.storage_config.write_retries,
        ));

        Ok(Self::with_components(config, playlists, downloader, store))
    }

    pub fn with_components(
        config: Arc<FollowerConfig>,
        playlists: Arc<dyn PlaylistProvider>,
        downloader: Arc<dyn SegmentDownloader>,
        store: Arc<dyn SegmentStore>,
    ) -> Self {
        Self {
            playlists,
            downloader,
            store,
            config,
            on_event: None,
        }
    }

    pub fn with_event_handler(mut self, on_event: OnEvent) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn emit(&self, event: FollowerEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    /// Resolve `url` to a media playlist and initialise sequence tracking.
    ///
    /// Every failure is reported as [`FollowerError::Open`], except segment
    /// download failures under [`InitialSegmentPolicy::DownloadExisting`].
    pub async fn open(&self, url: &str) -> Result<FollowerState, FollowerError> {
        self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Opening));
        let result = self.open_inner(url).await;
        if result.is_err() {
            self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Failed));
        }
        result
    }

    async fn open_inner(&self, url: &str) -> Result<FollowerState, FollowerError> {
        let playlist_config = &self.config.playlist_config;
        let start_url = Url::parse(url)
            .map_err(|e| FollowerError::InvalidUrl(format!("{url}: {e}")).into_open(url))?;

        let (media_url, playlist) = resolve_media_playlist(
            self.playlists.as_ref(),
            &start_url,
            playlist_config.variant_selection_policy,
            playlist_config.max_variant_depth,
        )
        .await
        .map_err(|e| e.into_open(url))?;

        let mut state = FollowerState::new(media_url, playlist.media_sequence);
        info!(
            url = %state.url,
            media_sequence = playlist.media_sequence,
            target_duration = playlist.target_duration,
            segments = playlist.segments.len(),
            "Opened media playlist"
        );

        match playlist_config.initial_segment_policy {
            InitialSegmentPolicy::SkipExisting => {
                for (sequence, segment) in playlist.sequenced_segments() {
                    info!(sequence, uri = %segment.uri, "Existing segment, not downloaded");
                    self.emit(FollowerEvent::SegmentListed {
                        sequence,
                        uri: segment.uri.clone(),
                    });
                }
                state.next_expected_sequence = playlist.end_sequence();
            }
            InitialSegmentPolicy::DownloadExisting => {
                self.download_window(&mut state, &playlist).await?;
            }
        }

        self.emit(FollowerEvent::Opened {
            url: state.url.clone(),
            media_sequence: state.last_seen_media_sequence,
            next_sequence: state.next_expected_sequence,
        });
        Ok(state)
    }

    /// Run one poll cycle: refresh the playlist, report gaps and download
    /// every segment not handled yet.
    ///
    /// On error `state` only reflects segments that were fully persisted.
    pub async fn poll_once(&self, state: &mut FollowerState) -> Result<PollResult, FollowerError> {
        let playlist = self.playlists.fetch_playlist(&state.url).await?;
        if playlist.is_variant {
            return Err(FollowerError::PlaylistParse(format!(
                "Expected media playlist, got master for {}",
                state.url
            )));
        }

        if playlist.media_sequence < state.last_seen_media_sequence {
            return Err(FollowerError::SequenceRegressed {
                previous: state.last_seen_media_sequence,
                current: playlist.media_sequence,
            });
        }

        if playlist.media_sequence == state.last_seen_media_sequence && !playlist.end_list {
            trace!(url = %state.url, media_sequence = playlist.media_sequence, "Playlist unchanged");
            self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Idle));
            return Ok(PollResult {
                outcome: PollOutcome::Idle,
                target_duration: playlist.target_duration,
                end_list: false,
            });
        }

        state.last_seen_media_sequence = playlist.media_sequence;
        debug!(
            url = %state.url,
            media_sequence = playlist.media_sequence,
            target_duration = playlist.target_duration,
            "Playlist refreshed"
        );
        self.emit(FollowerEvent::PlaylistRefreshed {
            media_sequence: playlist.media_sequence,
            target_duration: playlist.target_duration,
        });

        let gap = if state.next_expected_sequence < playlist.media_sequence {
            let missing = state.next_expected_sequence..playlist.media_sequence;
            warn!(
                url = %state.url,
                first_missing = missing.start,
                resume_at = missing.end,
                lost = missing.end - missing.start,
                "Missing segments, resynchronising"
            );
            self.emit(FollowerEvent::GapDetected {
                missing: missing.clone(),
            });
            state.next_expected_sequence = playlist.media_sequence;
            Some(missing)
        } else {
            None
        };

        let saved = self.download_window(state, &playlist).await?;

        Ok(PollResult {
            outcome: PollOutcome::Refreshed { gap, saved },
            target_duration: playlist.target_duration,
            end_list: playlist.end_list,
        })
    }

    /// Download, in order, every listed segment at or after
    /// `state.next_expected_sequence`.
    async fn download_window(
        &self,
        state: &mut FollowerState,
        playlist: &Playlist,
    ) -> Result<Vec<SavedSegment>, FollowerError> {
        let mut saved = Vec::new();
        if playlist.end_sequence() > state.next_expected_sequence {
            self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Downloading));
        }

        for (sequence, segment) in playlist.sequenced_segments() {
            if sequence < state.next_expected_sequence {
                continue;
            }

            let segment_url = playlist.resolve(&segment.uri)?;
            let data = self.downloader.download_segment(&segment_url).await?;
            let path = self.store.persist(&segment.uri, &data).await?;
            state.next_expected_sequence += 1;

            let size = data.len() as u64;
            info!(sequence, uri = %segment.uri, size, "Segment saved");
            self.emit(FollowerEvent::SegmentSaved {
                sequence,
                uri: segment.uri.clone(),
                path: path.clone(),
                size,
            });
            saved.push(SavedSegment {
                sequence,
                uri: segment.uri.clone(),
                path,
                size,
            });
        }

        Ok(saved)
    }

    /// Poll until cancelled, until the playlist ends or until an error occurs.
    ///
    /// Cancellation is only observed between poll cycles, so a segment write
    /// is never interrupted.
    pub async fn follow(
        &self,
        state: &mut FollowerState,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, FollowerError> {
        self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Following));

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(SessionEnd::Cancelled);
            }

            let poll = match self.poll_once(state).await {
                Ok(poll) => poll,
                Err(e) => break Err(e),
            };

            if poll.end_list {
                info!(url = %state.url, "ENDLIST reached, stopping");
                self.emit(FollowerEvent::StreamEnded);
                break Ok(SessionEnd::EndOfStream);
            }

            let wait = poll.next_wait(&self.config.poll_config);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(SessionEnd::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        };

        self.emit(FollowerEvent::PhaseChanged(FollowerPhase::Stopped));
        result
    }

    /// `open` followed by `follow`. Errors are logged here and handed back to
    /// the caller, which decides whether to start a new session.
    pub async fn run_session(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, FollowerError> {
        self.run_tracked_session(url, cancel).await.result
    }

    pub(crate) async fn run_tracked_session(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        if cancel.is_cancelled() {
            return SessionOutcome {
                opened: false,
                result: Ok(SessionEnd::Cancelled),
            };
        }

        // Anything failing before `Opened`, including the initial window
        // download, counts as a failed opening.
        let (opened, result) = match self.open(url).await {
            Ok(mut state) => (true, self.follow(&mut state, cancel).await),
            Err(e) => (false, Err(e)),
        };

        match &result {
            Ok(end) => info!(url, ?end, opened, "Follower session finished"),
            Err(e) => error!(url, error = %e, opened, "Follower session failed"),
        }
        SessionOutcome { opened, result }
    }
}
