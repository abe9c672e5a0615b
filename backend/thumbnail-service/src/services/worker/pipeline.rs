//! Per-item thumbnail pipeline
//!
//! This service handles the complete workflow for one delivered work item:
//! 1. Decode the delivered payload into a work item
//! 2. Download the original from storage
//! 3. Generate the thumbnail
//! 4. Upload the derivative under its deterministic key
//!
//! The derivative key depends only on the source key, so running the pipeline
//! twice for the same source overwrites the same object.

use bytes::Bytes;
use resilience::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::clients::ObjectStore;
use crate::error::{PipelineError, Result};
use crate::models::{Derivative, QueueMessage, StorageObjectRef, WorkItem};
use crate::services::thumbnail::{DerivativeNaming, ThumbnailProcessor};

pub struct ThumbnailPipeline {
    store: Arc<dyn ObjectStore>,
    processor: Arc<ThumbnailProcessor>,
    naming: DerivativeNaming,
    storage_timeout: Duration,
}

impl ThumbnailPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        processor: Arc<ThumbnailProcessor>,
        naming: DerivativeNaming,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            naming,
            storage_timeout,
        }
    }

    /// Run the pipeline for one queue delivery
    pub async fn process(&self, message: &QueueMessage) -> Result<Derivative> {
        let item = WorkItem::decode(&message.body)?;
        self.process_item(&item).await
    }

    /// Run the pipeline for an already-decoded work item
    pub async fn process_item(&self, item: &WorkItem) -> Result<Derivative> {
        let source = &item.source;

        // Only reachable if something bypassed the notifier
        if self.naming.is_derivative(&source.key) {
            return Err(PipelineError::Payload(format!(
                "work item references a derivative object: {source}"
            )));
        }

        info!(bucket = %source.bucket, key = %source.key, "Processing");

        let original = self.fetch_original(source).await?;
        debug!(key = %source.key, size = original.len(), "Downloaded original");

        let thumbnail = self.processor.clone().generate_async(original).await?;

        let target = source.with_key(self.naming.derivative_key(&source.key));
        let content_type = thumbnail.content_type();
        self.put_derivative(&target, thumbnail.data.clone(), content_type).await?;

        info!(
            bucket = %target.bucket,
            key = %source.key,
            derivative_key = %target.key,
            width = thumbnail.width,
            height = thumbnail.height,
            size = thumbnail.data.len(),
            "Created thumbnail"
        );

        Ok(Derivative {
            target,
            bytes: thumbnail.data,
            content_type,
            width: thumbnail.width,
            height: thumbnail.height,
        })
    }

    async fn fetch_original(&self, object: &StorageObjectRef) -> Result<Bytes> {
        with_timeout(self.storage_timeout, self.store.get(object))
            .await
            .map_err(|e| PipelineError::Transient(format!("fetching {object}: {e}")))?
            .map_err(PipelineError::from)
    }

    async fn put_derivative(
        &self,
        object: &StorageObjectRef,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        with_timeout(
            self.storage_timeout,
            self.store.put(object, data, content_type),
        )
        .await
        .map_err(|e| PipelineError::Transient(format!("storing {object}: {e}")))?
        .map_err(PipelineError::from)
    }
}
