//! Thumbnail generation
//!
//! - Processor: the resize function (bytes in, encoded bytes out)
//! - Keys: deterministic derivative key naming

pub mod keys;
pub mod processor;

pub use keys::DerivativeNaming;
pub use processor::{OutputFormat, ThumbnailConfig, ThumbnailProcessor, ThumbnailResult};
