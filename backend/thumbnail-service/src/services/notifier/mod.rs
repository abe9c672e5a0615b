//! Upload notification filter
//!
//! Turns storage-change events into published work items, skipping anything
//! that is not an original image.

pub mod filter;

pub use filter::{FilterOutcome, NotificationFilter, Relevance, RelevancePolicy, SkipReason};
