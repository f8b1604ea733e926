//! Command-line surface for the thumbnail migration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info};

use crate::config::{AppConfig, ThumbnailSettings};
use crate::error::MigrationError;
use crate::jobs::{BatchStatus, MigrationDriver, RunResult};
use crate::services::{
    CatalogFile, QueueReport, ThumbnailQueue, ThumbnailQueueConfig, ThumbnailStore,
};

#[derive(Debug, Parser)]
#[command(
    name = "video-thumbnails",
    about = "Attach YouTube thumbnails to course videos that are missing one"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select videos without thumbnails and dispatch thumbnail batches
    #[command(name = "video-thumbnails", alias = "video_thumbnails")]
    VideoThumbnails(VideoThumbnailsArgs),
}

#[derive(Debug, Args)]
pub struct VideoThumbnailsArgs {
    /// Run with the stored migration settings
    #[arg(long = "from-settings", alias = "from_settings")]
    pub from_settings: bool,

    /// Settings file to read instead of VIDEO_THUMBNAILS_SETTINGS
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Must specify --from-settings")]
    MissingSettingsSource,
}

impl VideoThumbnailsArgs {
    pub fn ensure_settings_source(&self) -> Result<(), UsageError> {
        if self.from_settings {
            Ok(())
        } else {
            Err(UsageError::MissingSettingsSource)
        }
    }

    /// Settings file this invocation reads, or a usage error when no source was chosen
    pub fn settings_path(&self, default: &Path) -> Result<PathBuf, UsageError> {
        self.ensure_settings_source()?;
        Ok(self
            .settings
            .clone()
            .unwrap_or_else(|| default.to_path_buf()))
    }
}

/// Check the arguments, then load the environment config.
///
/// Usage errors come back as [UsageError] so they are reported before any
/// problem with the environment.
pub fn load_config(
    args: &VideoThumbnailsArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(PathBuf, AppConfig)> {
    args.ensure_settings_source()?;
    let config = AppConfig::from_lookup(lookup)?;
    let settings_path = args.settings_path(&config.settings_path)?;
    Ok((settings_path, config))
}

/// Everything a finished command invocation produced
#[derive(Debug)]
pub struct CommandOutcome {
    pub run: RunResult,
    pub queue: QueueReport,
    /// Set when the queue worker did not stop cleanly; `queue` is then empty
    pub queue_error: Option<String>,
}

/// Load settings, run the migration and drain the thumbnail queue.
pub async fn run_video_thumbnails(settings_path: &Path, config: &AppConfig) -> Result<CommandOutcome> {
    let settings = ThumbnailSettings::load(settings_path).await?;
    let migration = settings.into_config();
    migration.validate()?;
    info!(
        settings = %settings_path.display(),
        commit = migration.commit,
        batch_size = migration.batch_size,
        "Loaded thumbnail settings"
    );

    let source = CatalogFile::new(&config.catalog_path);
    let store = ThumbnailStore::new(&config.thumbnails_path, config.thumbnail_base_url.clone())?;
    let queue = ThumbnailQueue::new(
        ThumbnailQueueConfig {
            max_concurrent: config.max_concurrent,
            queue_capacity: config.queue_capacity,
            enqueue_timeout: config.enqueue_timeout,
        },
        Arc::new(store),
    );

    let run = MigrationDriver::new(&source, &queue).run(&migration).await;
    let shutdown = queue.shutdown().await;
    finish_command(run, shutdown)
}

/// A failed queue shutdown is reported alongside the run, never instead of it
fn finish_command(
    run: Result<RunResult, MigrationError>,
    shutdown: Result<QueueReport>,
) -> Result<CommandOutcome> {
    let (queue, queue_error) = match shutdown {
        Ok(report) => (report, None),
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "Thumbnail queue did not shut down cleanly");
            (QueueReport::default(), Some(message))
        }
    };

    Ok(CommandOutcome {
        run: run?,
        queue,
        queue_error,
    })
}

/// Human readable run summary
pub fn summary_lines(outcome: &CommandOutcome) -> Vec<String> {
    let run = &outcome.run;
    let mut lines = vec![format!(
        "Thumbnail migration {}: {} selected, {} batches, {} dispatched",
        run.run_id, run.selected_count, run.batch_count, run.dispatched_count
    )];

    if run.dry_run {
        lines.push(format!(
            "Dry run: {} batches would have been dispatched. Set \"commit\": true to dispatch.",
            run.batch_count
        ));
    }

    for failure in run.failures() {
        if let BatchStatus::Failed(e) = &failure.status {
            lines.push(format!(
                "Batch {} ({} videos) was not dispatched: {}",
                failure.index, failure.size, e
            ));
        }
    }

    if let Some(e) = &outcome.queue_error {
        lines.push(format!("Thumbnail queue did not shut down cleanly: {e}"));
    }

    let queue = &outcome.queue;
    if queue.jobs > 0 {
        lines.push(format!(
            "Thumbnails: {} attached, {} already present, {} failed",
            queue.attached, queue.skipped, queue.failed
        ));
    }

    lines
}
