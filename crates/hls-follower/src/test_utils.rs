// In-memory stand-ins for the network and filesystem seams, shared by tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::config::FollowerConfig;
use crate::events::{FollowerEvent, OnEvent};
use crate::fetcher::SegmentDownloader;
use crate::follower::PlaylistFollower;
use crate::playlist::{Playlist, PlaylistProvider, Segment, VariantStream};
use crate::storage::SegmentStore;
use crate::FollowerError;

#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn media_playlist(url: &str, media_sequence: u64, target_duration: u64, uris: &[&str]) -> Playlist {
    let url = Url::parse(url).unwrap();
    Playlist {
        base_uri: url.join(".").unwrap(),
        is_variant: false,
        media_sequence,
        target_duration,
        segments: uris
            .iter()
            .map(|uri| Segment {
                uri: uri.to_string(),
                duration: target_duration as f32,
            })
            .collect(),
        variants: Vec::new(),
        end_list: false,
    }
}

pub fn master_playlist(url: &str, variants: &[(&str, u64)]) -> Playlist {
    let url = Url::parse(url).unwrap();
    Playlist {
        base_uri: url.join(".").unwrap(),
        is_variant: true,
        media_sequence: 0,
        target_duration: 0,
        segments: Vec::new(),
        variants: variants
            .iter()
            .map(|(uri, bandwidth)| VariantStream {
                uri: uri.to_string(),
                bandwidth: *bandwidth,
            })
            .collect(),
        end_list: false,
    }
}

pub fn fetch_error(url: &str) -> FollowerError {
    FollowerError::PlaylistFetch {
        url: url.to_string(),
        reason: "HTTP 503 Service Unavailable".to_string(),
    }
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Result<Playlist, FollowerError>>,
    fallback: Option<Result<Playlist, FollowerError>>,
    fetches: usize,
}

/// Serves queued playlist responses per URL, then the fallback forever.
#[derive(Default)]
pub struct ScriptedPlaylists {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedPlaylists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, response: Result<Playlist, FollowerError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .queued
            .push_back(response);
    }

    pub fn set_fallback(&self, url: &str, response: Result<Playlist, FollowerError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .fallback = Some(response);
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(url)
            .map_or(0, |script| script.fetches)
    }
}

#[async_trait]
impl PlaylistProvider for ScriptedPlaylists {
    async fn fetch_playlist(&self, url: &Url) -> Result<Playlist, FollowerError> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(url.to_string()).or_default();
        script.fetches += 1;
        match script.queued.pop_front() {
            Some(response) => response,
            None => script.fallback.clone().unwrap_or_else(|| {
                Err(FollowerError::PlaylistFetch {
                    url: url.to_string(),
                    reason: "no scripted response".to_string(),
                })
            }),
        }
    }
}

/// Returns `payload:<url>` for every segment and records request order.
#[derive(Default)]
pub struct RecordingDownloader {
    requested: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentDownloader for RecordingDownloader {
    async fn download_segment(&self, url: &Url) -> Result<Bytes, FollowerError> {
        self.requested.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url.as_str()) {
            return Err(FollowerError::SegmentFetch {
                url: url.to_string(),
                reason: "HTTP 500 Internal Server Error".to_string(),
            });
        }
        Ok(Bytes::from(format!("payload:{url}")))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(String, usize)>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, segment_uri: &str) {
        self.failing.lock().unwrap().insert(segment_uri.to_string());
    }

    pub fn saved_uris(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(uri, _)| uri.clone())
            .collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.saved.lock().unwrap().iter().map(|(_, size)| size).sum()
    }
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn persist(&self, segment_uri: &str, data: &Bytes) -> Result<PathBuf, FollowerError> {
        let path = PathBuf::from("/memory").join(segment_uri);
        if self.failing.lock().unwrap().contains(segment_uri) {
            return Err(FollowerError::storage(
                path,
                std::io::Error::other("disk full"),
            ));
        }
        self.saved
            .lock()
            .unwrap()
            .push((segment_uri.to_string(), data.len()));
        Ok(path)
    }
}

pub fn follower_with(
    config: FollowerConfig,
    playlists: &Arc<ScriptedPlaylists>,
    downloader: &Arc<RecordingDownloader>,
    store: &Arc<MemoryStore>,
) -> PlaylistFollower {
    PlaylistFollower::with_components(
        Arc::new(config),
        playlists.clone(),
        downloader.clone(),
        store.clone(),
    )
}

/// An event handler that appends every event to the returned vector.
pub fn collect_events() -> (Arc<Mutex<Vec<FollowerEvent>>>, OnEvent) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let on_event: OnEvent = Arc::new(move |event| sink.lock().unwrap().push(event));
    (events, on_event)
}
