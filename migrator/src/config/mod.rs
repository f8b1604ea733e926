//! Application configuration management

pub mod settings;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::LogFormat;
use crate::services::youtube::DEFAULT_THUMBNAIL_BASE_URL;

pub use settings::ThumbnailSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Settings file read by `--from-settings`
    pub settings_path: PathBuf,

    /// JSON export of the course video catalog
    pub catalog_path: PathBuf,

    /// Root directory thumbnails are stored under
    pub thumbnails_path: PathBuf,

    /// Batches the thumbnail queue accepts before rejecting
    pub queue_capacity: usize,

    /// Batches processed concurrently
    pub max_concurrent: usize,

    /// How long dispatching a batch waits for room in the queue
    pub enqueue_timeout: Duration,

    /// Host serving YouTube thumbnails
    pub thumbnail_base_url: String,

    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            settings_path: PathBuf::from(var(
                "VIDEO_THUMBNAILS_SETTINGS",
                "./data/video_thumbnail_settings.json",
            )),

            catalog_path: PathBuf::from(var("VIDEO_CATALOG_PATH", "./data/video_catalog.json")),

            thumbnails_path: PathBuf::from(var("THUMBNAILS_PATH", "./data/thumbnails")),

            queue_capacity: var("THUMBNAIL_QUEUE_CAPACITY", "100")
                .parse()
                .context("Invalid THUMBNAIL_QUEUE_CAPACITY")?,

            max_concurrent: var("THUMBNAIL_MAX_CONCURRENT", "2")
                .parse()
                .context("Invalid THUMBNAIL_MAX_CONCURRENT")?,

            enqueue_timeout: Duration::from_secs(
                var("THUMBNAIL_ENQUEUE_TIMEOUT_SECS", "30")
                    .parse()
                    .context("Invalid THUMBNAIL_ENQUEUE_TIMEOUT_SECS")?,
            ),

            thumbnail_base_url: var("YOUTUBE_THUMBNAIL_BASE_URL", DEFAULT_THUMBNAIL_BASE_URL),

            log_format: var("LOG_FORMAT", "pretty")
                .parse::<LogFormat>()
                .map_err(anyhow::Error::msg)
                .context("Invalid LOG_FORMAT")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(
            config.settings_path,
            PathBuf::from("./data/video_thumbnail_settings.json")
        );
        assert_eq!(config.catalog_path, PathBuf::from("./data/video_catalog.json"));
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.enqueue_timeout, Duration::from_secs(30));
        assert_eq!(config.thumbnail_base_url, DEFAULT_THUMBNAIL_BASE_URL);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("THUMBNAILS_PATH", "/srv/thumbs"),
            ("THUMBNAIL_QUEUE_CAPACITY", "7"),
            ("LOG_FORMAT", "json"),
            ("THUMBNAIL_ENQUEUE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.enqueue_timeout, Duration::from_secs(5));
        assert_eq!(config.thumbnails_path, PathBuf::from("/srv/thumbs"));
        assert_eq!(config.queue_capacity, 7);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("THUMBNAIL_MAX_CONCURRENT", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("THUMBNAIL_MAX_CONCURRENT"));
    }
}
