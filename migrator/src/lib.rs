//! Video thumbnail migration
//!
//! Finds course videos with a YouTube source and no thumbnail and schedules
//! thumbnail work for them in batches. [jobs::MigrationDriver] is the core;
//! the video catalog and the work queue are injected through
//! [services::VideoSource] and [services::TaskDispatcher].

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;

pub use error::{DispatchError, MigrationError};
