//! Storage-change notifications
//!
//! Mirrors the S3 event notification document (also emitted by S3-compatible
//! stores such as MinIO). Only the bucket name and object key drive the
//! pipeline; the remaining fields are parsed leniently for logging.

use serde::Deserialize;

use super::StorageObjectRef;
use crate::error::EventError;

/// Storage-change event raised on object creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadEvent {
    /// Absent for `s3:TestEvent` bodies
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    /// URL-encoded, with `+` standing for a space
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "eTag", default)]
    pub e_tag: Option<String>,
}

impl UploadEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Decoded object references, one per record
    pub fn object_refs(&self) -> impl Iterator<Item = Result<StorageObjectRef, EventError>> + '_ {
        self.records.iter().map(EventRecord::object_ref)
    }
}

impl EventRecord {
    /// Decoded reference to the created object
    pub fn object_ref(&self) -> Result<StorageObjectRef, EventError> {
        let raw = &self.s3.object.key;
        let key = urlencoding::decode(&raw.replace('+', " "))
            .map_err(|e| EventError::InvalidKey(format!("{raw}: {e}")))?
            .into_owned();

        Ok(StorageObjectRef::new(self.s3.bucket.name.clone(), key))
    }

    /// Encoded key as it appeared in the notification
    pub fn raw_key(&self) -> &str {
        &self.s3.object.key
    }
}
