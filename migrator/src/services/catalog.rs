//! Course video catalog access
//!
//! [VideoSource] is the read-only view of the catalog the migration driver
//! selects from. [CatalogFile] is the bundled implementation backed by a JSON
//! export of the course video catalog.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Encoding profile that marks a YouTube-hosted source.
pub const YOUTUBE_PROFILE: &str = "youtube";

/// Snapshot of a course video that needs a thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoRecord {
    pub course_id: String,
    pub video_id: String,
    pub source_url: String,
}

impl VideoRecord {
    pub fn new(
        course_id: impl Into<String>,
        video_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            video_id: video_id.into(),
            source_url: source_url.into(),
        }
    }
}

/// Which courses a selection covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseFilter {
    All,
    Courses(BTreeSet<String>),
}

impl CourseFilter {
    pub fn includes(&self, course_id: &str) -> bool {
        match self {
            CourseFilter::All => true,
            CourseFilter::Courses(ids) => ids.contains(course_id),
        }
    }
}

/// Read-only source of videos that have a YouTube profile and no thumbnail.
///
/// Implementations must not return the same `(course_id, video_id)` twice and
/// must not modify the catalog.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn select(&self, filter: &CourseFilter) -> Result<Vec<VideoRecord>>;
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    courses: Vec<CatalogCourse>,
}

#[derive(Debug, Deserialize)]
struct CatalogCourse {
    course_id: String,
    #[serde(default)]
    videos: Vec<CatalogVideo>,
}

#[derive(Debug, Deserialize)]
struct CatalogVideo {
    edx_video_id: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    encoded_videos: Vec<EncodedVideo>,
}

#[derive(Debug, Deserialize)]
struct EncodedVideo {
    profile: String,
    url: String,
}

impl CatalogVideo {
    fn has_thumbnail(&self) -> bool {
        self.thumbnail
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    fn youtube_url(&self) -> Option<&str> {
        self.encoded_videos
            .iter()
            .find(|e| e.profile == YOUTUBE_PROFILE && !e.url.trim().is_empty())
            .map(|e| e.url.trim())
    }
}

/// Catalog export stored as a JSON file
#[derive(Debug, Clone)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VideoSource for CatalogFile {
    async fn select(&self, filter: &CourseFilter) -> Result<Vec<VideoRecord>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read video catalog {}", self.path.display()))?;
        let document: CatalogDocument = serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid video catalog {}", self.path.display()))?;

        let records = candidates(&document, filter);
        debug!(
            catalog = %self.path.display(),
            courses = document.courses.len(),
            candidates = records.len(),
            "Selected videos from catalog"
        );
        Ok(records)
    }
}

fn candidates(document: &CatalogDocument, filter: &CourseFilter) -> Vec<VideoRecord> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut records = Vec::new();

    for course in document.courses.iter().filter(|c| filter.includes(&c.course_id)) {
        for video in &course.videos {
            if video.has_thumbnail() {
                continue;
            }
            let Some(url) = video.youtube_url() else {
                continue;
            };
            if !seen.insert((course.course_id.as_str(), video.edx_video_id.as_str())) {
                continue;
            }
            records.push(VideoRecord::new(&course.course_id, &video.edx_video_id, url));
        }
    }

    records
}
