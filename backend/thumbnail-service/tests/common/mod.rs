#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use resilience::RetryConfig;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thumbnail_service::clients::{MemoryObjectStore, MemoryWorkQueue};
use thumbnail_service::models::{StorageObjectRef, WorkItem};
use thumbnail_service::services::thumbnail::{
    DerivativeNaming, ThumbnailConfig, ThumbnailProcessor,
};
use thumbnail_service::services::worker::{ConsumerConfig, ThumbnailPipeline};

pub const BUCKET: &str = "uploads";

/// Gradient image encoded in `format`
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encoded_image(width, height, ImageFormat::Jpeg)
}

/// Queue body as delivered through an SNS subscription
pub fn sns_envelope(bucket: &str, key: &str) -> String {
    let item = WorkItem::new(StorageObjectRef::new(bucket, key));
    serde_json::json!({
        "Type": "Notification",
        "MessageId": "9a4c1d6e-0000-4000-8000-000000000001",
        "TopicArn": "arn:aws:sns:us-east-1:123456789012:uploads",
        "Subject": "New S3 Upload",
        "Message": item.to_payload(),
        "Timestamp": "2024-05-01T12:00:00.000Z",
    })
    .to_string()
}

/// S3 event notification with one record per key
pub fn s3_event(bucket: &str, keys: &[&str]) -> String {
    let records: Vec<_> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "eventTime": "2024-05-01T12:00:00.000Z",
                "s3": {
                    "bucket": {"name": bucket},
                    "object": {"key": key, "size": 2048}
                }
            })
        })
        .collect();
    serde_json::json!({ "Records": records }).to_string()
}

pub fn pipeline(store: Arc<MemoryObjectStore>) -> Arc<ThumbnailPipeline> {
    Arc::new(ThumbnailPipeline::new(
        store,
        Arc::new(ThumbnailProcessor::new(ThumbnailConfig::default())),
        DerivativeNaming::default(),
        Duration::from_secs(5),
    ))
}

fn quick_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Consumer settings with test-sized waits
pub fn consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        max_messages: 10,
        wait: Duration::from_millis(20),
        concurrency: 4,
        poll_failure_limit: 3,
        poll_backoff: quick_retry(u32::MAX),
        ack_retry: quick_retry(1),
    }
}

pub fn seeded_store(keys: &[&str]) -> Arc<MemoryObjectStore> {
    let store = Arc::new(MemoryObjectStore::new());
    for key in keys {
        store.insert(StorageObjectRef::new(BUCKET, *key), jpeg(640, 480), "image/jpeg");
    }
    store
}

pub fn new_queue() -> Arc<MemoryWorkQueue> {
    Arc::new(MemoryWorkQueue::new())
}
