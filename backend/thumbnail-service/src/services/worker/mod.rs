//! Queue worker
//!
//! - Pipeline: fetch, resize and store one work item
//! - Consumer: long-polling loop that acknowledges only completed items

pub mod consumer;
pub mod pipeline;

pub use consumer::{BatchReport, ConsumerConfig, ThumbnailConsumer};
pub use pipeline::ThumbnailPipeline;
