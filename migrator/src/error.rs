//! Error types for the thumbnail migration

use thiserror::Error;

/// Fatal errors that stop a migration run before any batch is formed.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Settings are missing or contradictory. Raised before selection.
    #[error("invalid migration settings: {0}")]
    Configuration(String),

    /// The video source could not enumerate candidates.
    #[error("failed to select course videos: {0:#}")]
    Selection(anyhow::Error),
}

/// Per-batch failure reported by a [TaskDispatcher](crate::services::TaskDispatcher).
///
/// Never aborts a run; the driver records it and moves to the next batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("thumbnail queue is full ({capacity} pending batches)")]
    QueueFull { capacity: usize },

    #[error("thumbnail queue is closed")]
    Closed,

    #[error("dispatch rejected: {0}")]
    Rejected(String),
}
