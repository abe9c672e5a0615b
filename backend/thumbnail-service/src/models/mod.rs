/// Data model for the thumbnail pipeline
///
/// A `WorkItem` is what the notifier publishes and the worker consumes. On the
/// wire it is the flat `{"bucket": ..., "key": ...}` pair; by the time it
/// reaches the queue it is usually wrapped in the fan-out service's
/// notification envelope. `WorkItem::decode` is the single place that knows
/// both shapes.
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

pub mod events;

pub use events::{EventRecord, UploadEvent};

/// Identifies one blob in object storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageObjectRef {
    pub bucket: String,
    pub key: String,
}

impl StorageObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Same bucket, different key
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Unit of processing work referencing one source object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem {
    pub source: StorageObjectRef,
}

/// Queue body shapes accepted by the worker
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeliveryEnvelope {
    /// Fan-out notification wrapping the work item as a JSON string
    Notification {
        #[serde(rename = "Message")]
        message: String,
    },
    /// Raw message delivery: the work item itself
    Raw(WorkItem),
}

impl WorkItem {
    pub fn new(source: StorageObjectRef) -> Self {
        Self { source }
    }

    /// Payload published to the fan-out transport
    pub fn to_payload(&self) -> String {
        serde_json::json!({
            "bucket": self.source.bucket,
            "key": self.source.key,
        })
        .to_string()
    }

    /// Decode a delivered queue body into a work item
    pub fn decode(body: &str) -> Result<Self, PipelineError> {
        let envelope: DeliveryEnvelope = serde_json::from_str(body)
            .map_err(|e| PipelineError::Payload(format!("unrecognised queue body: {e}")))?;

        let item = match envelope {
            DeliveryEnvelope::Raw(item) => item,
            DeliveryEnvelope::Notification { message } => serde_json::from_str(&message)
                .map_err(|e| {
                    PipelineError::Payload(format!("notification message is not a work item: {e}"))
                })?,
        };

        if item.source.bucket.is_empty() || item.source.key.is_empty() {
            return Err(PipelineError::Payload(
                "work item has an empty bucket or key".to_string(),
            ));
        }

        Ok(item)
    }
}

/// One delivery of a work item by the queue
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// Proof of this specific delivery, required to acknowledge it
    pub delivery_token: String,
    /// Approximate number of times the queue has handed this message out
    pub receive_count: u32,
}

/// Resized output written back to storage
#[derive(Debug, Clone)]
pub struct Derivative {
    pub target: StorageObjectRef,
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}
