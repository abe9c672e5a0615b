//! Thumbnail Service
//!
//! Event-driven thumbnail pipeline. The upload notifier filters storage-change
//! events and publishes work items for new originals; the thumbnail worker
//! consumes them from the work queue, resizes each original and stores the
//! derivative under a deterministic key.

pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;

// Public re-exports
pub use config::{NotifierConfig, PipelineSettings, WorkerConfig};
pub use error::{PipelineError, Result};
