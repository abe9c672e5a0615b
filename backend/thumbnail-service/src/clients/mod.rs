//! External collaborators
//!
//! The storage service, the fan-out transport and the work queue are only
//! reached through these traits. Production binaries wire in the AWS
//! implementations; tests and local runs use the in-memory ones.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::{QueueError, StorageError, TransportError};
use crate::models::{QueueMessage, StorageObjectRef};

pub mod memory;
pub mod s3;
pub mod sns;
pub mod sqs;

pub use memory::{MemoryObjectStore, MemoryPublisher, MemoryWorkQueue};
pub use s3::S3ObjectStore;
pub use sns::SnsPublisher;
pub use sqs::SqsWorkQueue;

/// Blob storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes; a missing object is `StorageError::NotFound`
    async fn get(&self, object: &StorageObjectRef) -> Result<Bytes, StorageError>;

    /// Write (or overwrite) an object
    async fn put(
        &self,
        object: &StorageObjectRef,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Fan-out / notification transport
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, subject: &str, payload: &str)
        -> Result<(), TransportError>;
}

/// Durable work queue with visibility-timeout redelivery
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Wait up to `wait` for at most `max_items` deliveries
    async fn poll(&self, max_items: u32, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge one delivery; the message will not be redelivered
    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError>;
}
