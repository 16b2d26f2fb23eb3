//! # Segment storage
//!
//! Downloaded segments are written under an output root at the path the
//! playlist declares for them. Writes go through a sibling `.part` file that
//! is renamed into place, so a crash never leaves a truncated segment behind
//! under its final name.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::FollowerError;

const PARTIAL_SUFFIX: &str = "part";

#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Persist `data` for the segment declared as `segment_uri` and return the
    /// final path.
    async fn persist(&self, segment_uri: &str, data: &Bytes) -> Result<PathBuf, FollowerError>;
}

/// Map a playlist-declared segment URI to a relative filesystem path.
///
/// Query strings and fragments are dropped, absolute URIs contribute only
/// their path, and parent-directory components are refused.
pub fn relative_segment_path(segment_uri: &str) -> Result<PathBuf, FollowerError> {
    let path_part = match Url::parse(segment_uri) {
        Ok(absolute) => absolute.path().to_string(),
        Err(_) => segment_uri
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let mut relative = PathBuf::new();
    for component in Path::new(&path_part).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(FollowerError::InvalidSegmentPath(format!(
                    "'{segment_uri}' escapes the output directory"
                )));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(FollowerError::InvalidSegmentPath(format!(
            "'{segment_uri}' has no file name"
        )));
    }
    Ok(relative)
}

/// Writes segments to the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSegmentStore {
    root: PathBuf,
    write_retries: u32,
}

impl FileSegmentStore {
    pub fn new(root: impl Into<PathBuf>, write_retries: u32) -> Self {
        Self {
            root: root.into(),
            write_retries,
        }
    }

    fn partial_path(target: &Path) -> PathBuf {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        target.with_file_name(name)
    }

    async fn write_atomic(target: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = Self::partial_path(target);
        let result = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&partial, target).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }
}

#[async_trait]
impl SegmentStore for FileSegmentStore {
    async fn persist(&self, segment_uri: &str, data: &Bytes) -> Result<PathBuf, FollowerError> {
        let target = self.root.join(relative_segment_path(segment_uri)?);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match Self::write_atomic(&target, data).await {
                Ok(()) => {
                    debug!(path = %target.display(), bytes = data.len(), "Segment written");
                    return Ok(target);
                }
                Err(e) if attempts <= self.write_retries => {
                    warn!(
                        path = %target.display(),
                        attempt = attempts,
                        error = %e,
                        "Segment write failed, retrying"
                    );
                }
                Err(e) => return Err(FollowerError::storage(target, e)),
            }
        }
    }
}
