//! One-shot download of everything a playlist currently lists.
//!
//! A master playlist is expanded into all of its renditions and every segment
//! of every rendition is fetched once. Nothing is polled afterwards.

use tracing::info;
use url::Url;

use crate::config::VariantSelectionPolicy;
use crate::events::FollowerEvent;
use crate::follower::PlaylistFollower;
use crate::playlist::{Playlist, resolve_media_playlist};
use crate::FollowerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Media playlists whose segments were downloaded
    pub playlists: usize,
    pub segments: usize,
    pub bytes: u64,
}

impl PlaylistFollower {
    /// Download every segment of every rendition reachable from `url`.
    ///
    /// The first failure aborts the preload.
    pub async fn preload(&self, url: &str) -> Result<PreloadReport, FollowerError> {
        let start_url =
            Url::parse(url).map_err(|e| FollowerError::InvalidUrl(format!("{url}: {e}")))?;
        let root = self.playlists.fetch_playlist(&start_url).await?;

        let mut report = PreloadReport::default();
        if root.is_variant {
            info!(url, renditions = root.variants.len(), "Preloading all renditions");
            // Nested masters are followed down their first entry, bounded as in `open`.
            let max_depth = self
                .config
                .playlist_config
                .max_variant_depth
                .saturating_sub(1);
            for variant in &root.variants {
                let variant_url = root.resolve(&variant.uri)?;
                let (media_url, media) = resolve_media_playlist(
                    self.playlists.as_ref(),
                    &variant_url,
                    VariantSelectionPolicy::First,
                    max_depth,
                )
                .await?;
                self.preload_media(&media_url, &media, &mut report).await?;
            }
        } else {
            self.preload_media(&start_url, &root, &mut report).await?;
        }

        info!(
            url,
            playlists = report.playlists,
            segments = report.segments,
            bytes = report.bytes,
            "Preload finished"
        );
        Ok(report)
    }

    async fn preload_media(
        &self,
        url: &Url,
        playlist: &Playlist,
        report: &mut PreloadReport,
    ) -> Result<(), FollowerError> {
        info!(url = %url, segments = playlist.segments.len(), "Preloading playlist");

        for (sequence, segment) in playlist.sequenced_segments() {
            let segment_url = playlist.resolve(&segment.uri)?;
            let data = self.downloader.download_segment(&segment_url).await?;
            let path = self.store.persist(&segment.uri, &data).await?;

            let size = data.len() as u64;
            info!(sequence, uri = %segment.uri, size, "Segment preloaded");
            self.emit(FollowerEvent::SegmentSaved {
                sequence,
                uri: segment.uri.clone(),
                path,
                size,
            });
            report.segments += 1;
            report.bytes += size;
        }

        report.playlists += 1;
        Ok(())
    }
}
