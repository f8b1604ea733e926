//! Thumbnail work queue
//!
//! [TaskDispatcher] is what the migration driver hands batches to.
//! [ThumbnailQueue] is the bundled implementation: a bounded channel feeding a
//! worker that runs the fetch-and-attach step for every video in a batch, with
//! a cap on how many batches are processed at once.
//!
//! Enqueueing never waits for work to run, only for room in the queue. A batch
//! that finds no room within the enqueue timeout is rejected with
//! [DispatchError::QueueFull] and it is up to the caller to re-run later.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::catalog::VideoRecord;
use super::thumbnails::{AttachOutcome, ThumbnailAttacher};
use crate::error::DispatchError;

/// A bounded, ordered slice of the selection sent to the dispatcher in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Run that formed this batch
    pub run_id: Uuid,
    /// Zero-based position within the run
    pub index: usize,
    pub videos: Vec<VideoRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Schedules asynchronous fetch-and-attach work for a batch.
///
/// Implementations return once the work is scheduled, not when it has run.
/// Retries and timeouts are the implementation's concern. Running the same
/// batch twice must be harmless.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn enqueue(&self, batch: &Batch) -> Result<(), DispatchError>;
}

/// Configuration for the thumbnail queue
#[derive(Debug, Clone)]
pub struct ThumbnailQueueConfig {
    /// Batches processed at the same time
    pub max_concurrent: usize,
    /// Batches that may wait in the queue
    pub queue_capacity: usize,
    /// How long an enqueue waits for room before rejecting the batch
    pub enqueue_timeout: Duration,
}

impl Default for ThumbnailQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            queue_capacity: 100,
            enqueue_timeout: Duration::from_secs(30),
        }
    }
}

/// Totals for everything the queue processed before shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub jobs: usize,
    pub attached: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl QueueReport {
    fn merge(&mut self, other: QueueReport) {
        self.attached += other.attached;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Bounded queue of thumbnail batches with a single dispatching worker
pub struct ThumbnailQueue {
    sender: mpsc::Sender<Batch>,
    capacity: usize,
    enqueue_timeout: Duration,
    worker: JoinHandle<QueueReport>,
}

impl ThumbnailQueue {
    /// Start the queue worker. Must be called from within a tokio runtime.
    pub fn new(config: ThumbnailQueueConfig, attacher: Arc<dyn ThumbnailAttacher>) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Batch>(capacity);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        let worker = tokio::spawn(run_worker(receiver, semaphore, attacher));
        info!(
            queue = "thumbnails",
            capacity,
            max_concurrent = config.max_concurrent,
            "Thumbnail queue started"
        );

        Self {
            sender,
            capacity,
            enqueue_timeout: config.enqueue_timeout,
            worker,
        }
    }

    /// Stop accepting batches and wait for every scheduled batch to finish.
    pub async fn shutdown(self) -> Result<QueueReport> {
        drop(self.sender);
        let report = self.worker.await.context("Thumbnail queue worker panicked")?;
        info!(
            queue = "thumbnails",
            jobs = report.jobs,
            attached = report.attached,
            skipped = report.skipped,
            failed = report.failed,
            "Thumbnail queue stopped"
        );
        Ok(report)
    }
}

#[async_trait]
impl TaskDispatcher for ThumbnailQueue {
    async fn enqueue(&self, batch: &Batch) -> Result<(), DispatchError> {
        match tokio::time::timeout(self.enqueue_timeout, self.sender.send(batch.clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(DispatchError::Closed),
            Err(_) => {
                return Err(DispatchError::QueueFull {
                    capacity: self.capacity,
                });
            }
        }

        debug!(
            queue = "thumbnails",
            run_id = %batch.run_id,
            batch = batch.index,
            videos = batch.len(),
            "Batch queued"
        );
        Ok(())
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Batch>,
    semaphore: Arc<Semaphore>,
    attacher: Arc<dyn ThumbnailAttacher>,
) -> QueueReport {
    let mut report = QueueReport::default();
    let mut tasks = JoinSet::new();

    while let Some(batch) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            error!(queue = "thumbnails", "Semaphore closed, dropping remaining batches");
            break;
        };
        report.jobs += 1;

        let attacher = attacher.clone();
        tasks.spawn(async move {
            let _permit = permit;
            process_batch(attacher.as_ref(), batch).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(batch_report) => report.merge(batch_report),
            Err(e) => error!(queue = "thumbnails", error = %e, "Batch task panicked"),
        }
    }

    report
}

async fn process_batch(attacher: &dyn ThumbnailAttacher, batch: Batch) -> QueueReport {
    info!(
        run_id = %batch.run_id,
        batch = batch.index,
        videos = batch.len(),
        "Processing thumbnail batch"
    );

    let mut report = QueueReport::default();
    for video in &batch.videos {
        match attacher.attach(video).await {
            Ok(AttachOutcome::Attached) => report.attached += 1,
            Ok(AttachOutcome::AlreadyPresent) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    run_id = %batch.run_id,
                    batch = batch.index,
                    course_id = %video.course_id,
                    video_id = %video.video_id,
                    error = %e,
                    "Failed to attach thumbnail"
                );
            }
        }
    }

    debug!(
        run_id = %batch.run_id,
        batch = batch.index,
        attached = report.attached,
        skipped = report.skipped,
        failed = report.failed,
        "Thumbnail batch finished"
    );
    report
}
