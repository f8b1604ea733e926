//! Batch jobs

pub mod video_thumbnails;

pub use video_thumbnails::{
    BatchOutcome, BatchStatus, MigrationConfig, MigrationDriver, RunPhase, RunResult,
    into_batches,
};
