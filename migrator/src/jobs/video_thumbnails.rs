//! Video thumbnail migration job
//!
//! Selects course videos that have a YouTube source but no thumbnail, splits
//! them into fixed-size batches and hands each batch to a [TaskDispatcher].
//!
//! A run moves through `Validating -> Selecting -> Batching -> Dispatching ->
//! Completed`. Invalid settings or a failing video source end the run in
//! `Failed` before anything is dispatched. A batch the dispatcher rejects is
//! recorded and the run carries on with the next one; re-running the job is
//! how rejected batches get picked up again.
//!
//! In dry-run mode (`commit = false`) the same batches are formed and
//! reported, but the dispatcher is never called.

use std::collections::BTreeSet;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{DispatchError, MigrationError};
use crate::services::{Batch, CourseFilter, TaskDispatcher, VideoRecord, VideoSource};

/// Validated-at-run settings for one migration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Ignore `course_ids` and migrate every course
    pub all_course_videos: bool,
    /// Actually dispatch; `false` is a dry run
    pub commit: bool,
    /// Maximum videos per dispatched batch
    pub batch_size: usize,
    pub course_ids: Option<BTreeSet<String>>,
}

impl MigrationConfig {
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.batch_size == 0 {
            return Err(MigrationError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        let has_courses = self.course_ids.as_ref().is_some_and(|ids| !ids.is_empty());
        if !self.all_course_videos && !has_courses {
            return Err(MigrationError::Configuration(
                "course_ids must be set when all_course_videos is false".to_string(),
            ));
        }
        Ok(())
    }

    /// Filter passed to the video source
    pub fn course_filter(&self) -> CourseFilter {
        match (&self.course_ids, self.all_course_videos) {
            (Some(ids), false) => CourseFilter::Courses(ids.clone()),
            _ => CourseFilter::All,
        }
    }
}

/// Stage of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Validating,
    Selecting,
    Batching,
    Dispatching,
    Completed,
    Failed,
}

/// What happened to a single batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    Dispatched,
    /// Dry run: the batch was formed but not sent
    WouldDispatch,
    Failed(DispatchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub status: BatchStatus,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub selected_count: usize,
    pub batch_count: usize,
    pub dispatched_count: usize,
    pub outcomes: Vec<BatchOutcome>,
}

impl RunResult {
    /// `(selected_count, batch_count, dispatched_count)`
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.selected_count, self.batch_count, self.dispatched_count)
    }

    /// Batches the dispatcher rejected
    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, BatchStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Split a selection into consecutive batches of at most `batch_size`,
/// keeping selection order.
pub fn into_batches(run_id: Uuid, videos: Vec<VideoRecord>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(videos.len().div_ceil(batch_size));
    let mut videos = videos.into_iter().peekable();

    while videos.peek().is_some() {
        batches.push(Batch {
            run_id,
            index: batches.len(),
            videos: videos.by_ref().take(batch_size).collect(),
        });
    }
    batches
}

/// Drives one thumbnail migration run against injected collaborators
pub struct MigrationDriver<'a> {
    source: &'a dyn VideoSource,
    dispatcher: &'a dyn TaskDispatcher,
}

impl<'a> MigrationDriver<'a> {
    pub fn new(source: &'a dyn VideoSource, dispatcher: &'a dyn TaskDispatcher) -> Self {
        Self { source, dispatcher }
    }

    /// Run the migration with a fresh run id
    pub async fn run(&self, config: &MigrationConfig) -> Result<RunResult, MigrationError> {
        self.run_with_id(Uuid::new_v4(), config).await
    }

    pub async fn run_with_id(
        &self,
        run_id: Uuid,
        config: &MigrationConfig,
    ) -> Result<RunResult, MigrationError> {
        let span = info_span!("video_thumbnails", %run_id, commit = config.commit);
        self.execute(run_id, config).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        config: &MigrationConfig,
    ) -> Result<RunResult, MigrationError> {
        enter(RunPhase::Validating);
        if let Err(e) = config.validate() {
            enter(RunPhase::Failed);
            error!(error = %e, "Refusing to run thumbnail migration");
            return Err(e);
        }

        enter(RunPhase::Selecting);
        let filter = config.course_filter();
        let videos = match self.source.select(&filter).await {
            Ok(videos) => videos,
            Err(e) => {
                enter(RunPhase::Failed);
                let e = MigrationError::Selection(e);
                error!(error = %e, "Video selection failed");
                return Err(e);
            }
        };
        let selected_count = videos.len();
        info!(
            selected = selected_count,
            all_course_videos = config.all_course_videos,
            "Selected videos without thumbnails"
        );

        enter(RunPhase::Batching);
        let batches = into_batches(run_id, videos, config.batch_size);
        debug!(batches = batches.len(), batch_size = config.batch_size, "Formed batches");

        enter(RunPhase::Dispatching);
        let mut dispatched_count = 0;
        let mut outcomes = Vec::with_capacity(batches.len());
        for batch in &batches {
            let status = if config.commit {
                self.dispatch(batch).await
            } else {
                preview(batch)
            };
            if status == BatchStatus::Dispatched {
                dispatched_count += batch.len();
            }
            outcomes.push(BatchOutcome {
                index: batch.index,
                size: batch.len(),
                status,
            });
        }

        enter(RunPhase::Completed);
        let result = RunResult {
            run_id,
            dry_run: !config.commit,
            selected_count,
            batch_count: batches.len(),
            dispatched_count,
            outcomes,
        };
        info!(
            selected = result.selected_count,
            batches = result.batch_count,
            dispatched = result.dispatched_count,
            failed_batches = result.failures().count(),
            dry_run = result.dry_run,
            "Thumbnail migration finished"
        );
        Ok(result)
    }

    async fn dispatch(&self, batch: &Batch) -> BatchStatus {
        match self.dispatcher.enqueue(batch).await {
            Ok(()) => {
                info!(batch = batch.index, videos = batch.len(), "Dispatched thumbnail batch");
                BatchStatus::Dispatched
            }
            Err(e) => {
                warn!(
                    batch = batch.index,
                    videos = batch.len(),
                    error = %e,
                    "Failed to dispatch thumbnail batch"
                );
                BatchStatus::Failed(e)
            }
        }
    }
}

fn preview(batch: &Batch) -> BatchStatus {
    info!(batch = batch.index, videos = batch.len(), "[dry run] Would dispatch thumbnail batch");
    for video in &batch.videos {
        debug!(
            batch = batch.index,
            course_id = %video.course_id,
            video_id = %video.video_id,
            source_url = %video.source_url,
            "[dry run] Would fetch thumbnail"
        );
    }
    BatchStatus::WouldDispatch
}

fn enter(phase: RunPhase) {
    debug!(phase = ?phase, "Thumbnail migration phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn videos(n: usize) -> Vec<VideoRecord> {
        (1..=n)
            .map(|i| VideoRecord::new("course", format!("v{i}"), format!("https://youtu.be/v{i}")))
            .collect()
    }

    fn config(all: bool, courses: &[&str]) -> MigrationConfig {
        MigrationConfig {
            all_course_videos: all,
            commit: true,
            batch_size: 10,
            course_ids: if courses.is_empty() {
                None
            } else {
                Some(courses.iter().map(|c| c.to_string()).collect())
            },
        }
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_validate_requires_courses_without_all() {
        assert_matches!(config(false, &[]).validate(), Err(MigrationError::Configuration(_)));

        let empty_set = MigrationConfig {
            course_ids: Some(BTreeSet::new()),
            ..config(false, &[])
        };
        assert_matches!(empty_set.validate(), Err(MigrationError::Configuration(_)));

        assert!(config(false, &["course-a"]).validate().is_ok());
        assert!(config(true, &[]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let zero = MigrationConfig {
            batch_size: 0,
            ..config(true, &[])
        };
        assert_matches!(zero.validate(), Err(MigrationError::Configuration(msg)) if msg.contains("batch_size"));
    }

    #[test]
    fn test_course_filter() {
        assert_eq!(config(true, &["a"]).course_filter(), CourseFilter::All);
        assert_eq!(
            config(false, &["b", "a"]).course_filter(),
            CourseFilter::Courses(BTreeSet::from(["a".to_string(), "b".to_string()]))
        );
    }

    // =========================================================================
    // Batching Tests
    // =========================================================================

    #[test]
    fn test_batch_count_is_ceiling() {
        for (n, size, expected) in [(0, 10, 0), (1, 10, 1), (10, 10, 1), (11, 10, 2), (25, 10, 3), (7, 1, 7)] {
            assert_eq!(
                into_batches(Uuid::nil(), videos(n), size).len(),
                expected,
                "n={n} batch_size={size}"
            );
        }
    }

    #[test]
    fn test_batching_is_lossless_and_ordered() {
        let selection = videos(25);
        let batches = into_batches(Uuid::nil(), selection.clone(), 10);

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        let indexes: Vec<usize> = batches.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        let rejoined: Vec<VideoRecord> = batches.into_iter().flat_map(|b| b.videos).collect();
        assert_eq!(rejoined, selection);
    }

    #[test]
    fn test_batches_carry_run_id() {
        let run_id = Uuid::new_v4();
        let batches = into_batches(run_id, videos(3), 2);
        assert!(batches.iter().all(|b| b.run_id == run_id));
    }
}
