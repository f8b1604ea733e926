//! External service integrations

pub mod catalog;
pub mod logging;
pub mod queues;
pub mod rate_limiter;
pub mod thumbnails;
pub mod youtube;

pub use catalog::{CatalogFile, CourseFilter, VideoRecord, VideoSource};
pub use logging::{LogFormat, init_tracing};
pub use queues::{Batch, QueueReport, TaskDispatcher, ThumbnailQueue, ThumbnailQueueConfig};
pub use thumbnails::{AttachOutcome, ThumbnailAttacher, ThumbnailStore};
