//! Thumbnail migration settings
//!
//! The settings file is what `--from-settings` reads: an admin-maintained
//! record of which courses to migrate, the batch size and whether to commit.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::jobs::MigrationConfig;

pub const DEFAULT_BATCH_SIZE: usize = 100;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Course ids as stored: one whitespace-separated string or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CourseIdList {
    Text(String),
    List(Vec<String>),
}

impl CourseIdList {
    /// Non-blank, trimmed, de-duplicated ids
    pub fn to_set(&self) -> BTreeSet<String> {
        match self {
            CourseIdList::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            CourseIdList::List(ids) => ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThumbnailSettings {
    #[serde(default)]
    pub all_course_videos: bool,

    #[serde(default)]
    pub commit: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub course_ids: Option<CourseIdList>,
}

impl ThumbnailSettings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read thumbnail settings {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid thumbnail settings {}", path.display()))
    }

    pub fn from_json(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Convert to the driver's config. Validation happens when the run starts.
    pub fn into_config(self) -> MigrationConfig {
        MigrationConfig {
            all_course_videos: self.all_course_videos,
            commit: self.commit,
            batch_size: self.batch_size,
            course_ids: self.course_ids.as_ref().map(CourseIdList::to_set),
        }
    }
}
