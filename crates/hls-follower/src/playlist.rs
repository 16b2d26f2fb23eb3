// Playlist model and loading: fetches, parses and resolves HLS playlists.

use std::sync::Arc;

use async_trait::async_trait;
use m3u8_rs::parse_playlist_res;
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::config::{FollowerConfig, VariantSelectionPolicy};
use crate::FollowerError;

/// One media segment as listed in a media playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Relative or absolute location as declared in the playlist
    pub uri: String,
    /// `#EXTINF` duration in seconds
    pub duration: f32,
}

/// A rendition referenced by a master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantStream {
    pub uri: String,
    pub bandwidth: u64,
}

/// A parsed playlist document, re-fetched on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    /// Base used to resolve relative segment and variant URIs
    pub base_uri: Url,
    pub is_variant: bool,
    pub media_sequence: u64,
    /// Nominal segment duration in seconds
    pub target_duration: u64,
    pub segments: Vec<Segment>,
    /// Renditions of a master playlist, I-frame-only streams excluded
    pub variants: Vec<VariantStream>,
    pub end_list: bool,
}

impl Playlist {
    /// Parse a playlist document fetched from `url`.
    pub fn parse(bytes: &[u8], url: &Url) -> Result<Self, FollowerError> {
        let base_uri = url.join(".").map_err(|e| {
            FollowerError::InvalidUrl(format!("Failed to determine base URL of {url}: {e}"))
        })?;

        match parse_playlist_res(bytes) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(master)) => Ok(Self {
                base_uri,
                is_variant: true,
                media_sequence: 0,
                target_duration: 0,
                segments: Vec::new(),
                variants: master
                    .variants
                    .into_iter()
                    .filter(|v| !v.is_i_frame)
                    .map(|v| VariantStream {
                        uri: v.uri,
                        bandwidth: v.bandwidth,
                    })
                    .collect(),
                end_list: false,
            }),
            Ok(m3u8_rs::Playlist::MediaPlaylist(media)) => {
                // Every listed segment needs a representable sequence number
                if media
                    .media_sequence
                    .checked_add(media.segments.len() as u64)
                    .is_none()
                {
                    return Err(FollowerError::PlaylistParse(format!(
                        "Media sequence {} of {url} overflows with {} segments",
                        media.media_sequence,
                        media.segments.len()
                    )));
                }
                Ok(Self {
                    base_uri,
                    is_variant: false,
                    media_sequence: media.media_sequence,
                    target_duration: media.target_duration,
                    segments: media
                        .segments
                        .into_iter()
                        .map(|s| Segment {
                            uri: s.uri,
                            duration: s.duration,
                        })
                        .collect(),
                    variants: Vec::new(),
                    end_list: media.end_list,
                })
            }
            Err(e) => Err(FollowerError::PlaylistParse(format!(
                "Failed to parse playlist {url}: {e}"
            ))),
        }
    }

    /// Resolve a playlist-relative URI against [`Playlist::base_uri`].
    pub fn resolve(&self, uri: &str) -> Result<Url, FollowerError> {
        self.base_uri.join(uri).map_err(|e| {
            FollowerError::InvalidUrl(format!(
                "Could not join base URL {} with URI {uri}: {e}",
                self.base_uri
            ))
        })
    }

    /// Segments paired with their absolute sequence numbers.
    pub fn sequenced_segments(&self) -> impl Iterator<Item = (u64, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .map(move |(idx, segment)| (self.media_sequence + idx as u64, segment))
    }

    /// Sequence number one past the last listed segment.
    #[inline]
    pub fn end_sequence(&self) -> u64 {
        self.media_sequence + self.segments.len() as u64
    }

    pub fn select_variant(
        &self,
        policy: VariantSelectionPolicy,
    ) -> Result<&VariantStream, FollowerError> {
        let selected = match policy {
            VariantSelectionPolicy::First => self.variants.first(),
            VariantSelectionPolicy::HighestBitrate => {
                self.variants.iter().max_by_key(|v| v.bandwidth)
            }
            VariantSelectionPolicy::LowestBitrate => {
                self.variants.iter().min_by_key(|v| v.bandwidth)
            }
        };
        selected.ok_or_else(|| {
            FollowerError::PlaylistParse("Master playlist has no variants".to_string())
        })
    }
}

#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    async fn fetch_playlist(&self, url: &Url) -> Result<Playlist, FollowerError>;
}

/// Follow master playlists down to a media playlist.
///
/// Returns the media playlist URL together with the playlist fetched from it.
pub async fn resolve_media_playlist(
    provider: &dyn PlaylistProvider,
    url: &Url,
    policy: VariantSelectionPolicy,
    max_depth: u32,
) -> Result<(Url, Playlist), FollowerError> {
    let mut current_url = url.clone();
    let mut playlist = provider.fetch_playlist(&current_url).await?;
    let mut depth = 0;

    while playlist.is_variant {
        depth += 1;
        if depth > max_depth {
            return Err(FollowerError::PlaylistParse(format!(
                "Variant resolution did not reach a media playlist within {max_depth} levels"
            )));
        }
        let variant = playlist.select_variant(policy)?;
        let next_url = playlist.resolve(&variant.uri)?;
        debug!(
            master = %current_url,
            media = %next_url,
            bandwidth = variant.bandwidth,
            "Selected variant playlist"
        );
        current_url = next_url;
        playlist = provider.fetch_playlist(&current_url).await?;
    }

    Ok((current_url, playlist))
}

/// Fetches playlists over HTTP.
pub struct HttpPlaylistLoader {
    http_client: Client,
    config: Arc<FollowerConfig>,
}

impl HttpPlaylistLoader {
    pub fn new(http_client: Client, config: Arc<FollowerConfig>) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl PlaylistProvider for HttpPlaylistLoader {
    async fn fetch_playlist(&self, url: &Url) -> Result<Playlist, FollowerError> {
        let fetch_error = |reason: String| FollowerError::PlaylistFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http_client
            .get(url.clone())
            .timeout(self.config.playlist_config.playlist_fetch_timeout)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        let playlist_bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        trace!(url = %url, bytes = playlist_bytes.len(), "Fetched playlist");

        Playlist::parse(&playlist_bytes, url)
    }
}
