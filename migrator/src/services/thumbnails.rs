//! Thumbnail fetching and storage
//!
//! [ThumbnailStore] is the fetch-and-attach step run for every video in a
//! dispatched batch. Attaching is idempotent: a video that already has a
//! stored thumbnail is left alone, which is what makes repeated migration
//! runs safe.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use super::catalog::VideoRecord;
use super::rate_limiter::{RateLimitedClient, ResponseExt, RetryConfig, Retryable, retry_async};
use super::youtube::{extract_video_id, thumbnail_url};

/// Result of attaching a thumbnail to a single video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    AlreadyPresent,
}

/// The per-video operation a dispatched batch runs.
///
/// Must be a no-op for a video whose thumbnail is already attached.
#[async_trait]
pub trait ThumbnailAttacher: Send + Sync {
    async fn attach(&self, video: &VideoRecord) -> Result<AttachOutcome>;
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },
    #[error("failed to fetch {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Downloads YouTube thumbnails into a directory tree keyed by course and video
pub struct ThumbnailStore {
    root: PathBuf,
    base_url: String,
    client: RateLimitedClient,
    retry: RetryConfig,
}

impl ThumbnailStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            base_url: base_url.into(),
            client: RateLimitedClient::for_youtube()?,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn course_dir(&self, course_id: &str) -> PathBuf {
        self.root.join(path_component(course_id))
    }

    /// Path of the stored thumbnail for a video, if one exists
    pub async fn find_existing(&self, video: &VideoRecord) -> Result<Option<PathBuf>> {
        let stem = path_component(&video.video_id);
        find_with_stem(&self.course_dir(&video.course_id), &stem).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            reason: format!("{e:#}"),
        })?;

        if !response.status().is_success() {
            let reason = format!("HTTP {}", response.status());
            return Err(if response.is_transient_error() {
                FetchError::Transient { url: url.to_string(), reason }
            } else {
                FetchError::Permanent { url: url.to_string(), reason }
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ThumbnailAttacher for ThumbnailStore {
    async fn attach(&self, video: &VideoRecord) -> Result<AttachOutcome> {
        if let Some(existing) = self.find_existing(video).await? {
            debug!(
                course_id = %video.course_id,
                video_id = %video.video_id,
                path = %existing.display(),
                "Thumbnail already attached"
            );
            return Ok(AttachOutcome::AlreadyPresent);
        }

        let youtube_id = extract_video_id(&video.source_url).with_context(|| {
            format!("No YouTube video id in source url {}", video.source_url)
        })?;
        let url = thumbnail_url(&self.base_url, &youtube_id);

        let bytes = retry_async(|| self.fetch(&url), &self.retry, "thumbnail_download").await?;
        let extension = image_extension(&bytes)?;

        let dir = self.course_dir(&video.course_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let stem = path_component(&video.video_id);
        let path = dir.join(format!("{stem}.{extension}"));
        let partial = dir.join(format!("{stem}.{extension}.part"));
        tokio::fs::write(&partial, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("Failed to move thumbnail into {}", path.display()))?;

        info!(
            course_id = %video.course_id,
            video_id = %video.video_id,
            path = %path.display(),
            size = bytes.len(),
            "Thumbnail attached"
        );
        Ok(AttachOutcome::Attached)
    }
}

/// Percent-encoded file name for an id. Distinct ids never share a name, and
/// dots are encoded so the result is never `.`/`..` and never carries an extension.
fn path_component(id: &str) -> String {
    urlencoding::encode(id).replace('.', "%2E")
}

/// File extension for downloaded image bytes, `jpg` when the type is unknown
fn image_extension(bytes: &[u8]) -> Result<&'static str> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.extension()),
        Some(kind) => anyhow::bail!("Thumbnail payload is not an image ({})", kind.mime_type()),
        None => Ok("jpg"),
    }
}

async fn find_with_stem(dir: &Path, stem: &str) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_stem = path.file_stem().and_then(|s| s.to_str()) == Some(stem);
        let is_partial = path.extension().and_then(|e| e.to_str()) == Some("part");
        if matches_stem && !is_partial {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
