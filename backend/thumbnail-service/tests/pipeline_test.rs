//! Per-item pipeline against in-memory storage
mod common;

use common::*;
use image::GenericImageView;
use std::sync::Arc;
use std::time::Duration;
use thumbnail_service::clients::MemoryObjectStore;
use thumbnail_service::models::{QueueMessage, StorageObjectRef, WorkItem};
use thumbnail_service::services::thumbnail::{
    DerivativeNaming, ThumbnailConfig, ThumbnailProcessor,
};
use thumbnail_service::services::worker::ThumbnailPipeline;
use thumbnail_service::PipelineError;

fn delivery(body: String) -> QueueMessage {
    QueueMessage {
        message_id: "m-1".to_string(),
        body,
        delivery_token: "token-1".to_string(),
        receive_count: 1,
    }
}

#[tokio::test]
async fn test_creates_derivative_under_reserved_prefix() {
    let store = seeded_store(&["photos/cat.jpg"]);
    let pipeline = pipeline(store.clone());

    let derivative = pipeline
        .process(&delivery(sns_envelope(BUCKET, "photos/cat.jpg")))
        .await
        .unwrap();

    assert_eq!(
        derivative.target,
        StorageObjectRef::new(BUCKET, "derivatives/photos/cat_thumb.jpg")
    );
    assert_eq!((derivative.width, derivative.height), (300, 225));
    assert_eq!(derivative.content_type, "image/jpeg");

    let stored = store.object(&derivative.target).unwrap();
    assert_eq!(stored.content_type, "image/jpeg");
    let decoded = image::load_from_memory(&stored.data).unwrap();
    assert_eq!(decoded.dimensions(), (300, 225));

    // The original is untouched
    assert!(store
        .object(&StorageObjectRef::new(BUCKET, "photos/cat.jpg"))
        .is_some());
}

#[tokio::test]
async fn test_raw_delivery_body_is_accepted() {
    let store = seeded_store(&["a.jpg"]);
    let pipeline = pipeline(store.clone());
    let body = WorkItem::new(StorageObjectRef::new(BUCKET, "a.jpg")).to_payload();

    let derivative = pipeline.process(&delivery(body)).await.unwrap();
    assert_eq!(derivative.target.key, "derivatives/a_thumb.jpg");
}

#[tokio::test]
async fn test_redelivery_overwrites_same_derivative() {
    let store = seeded_store(&["photos/cat.jpg"]);
    let pipeline = pipeline(store.clone());
    let message = delivery(sns_envelope(BUCKET, "photos/cat.jpg"));

    let first = pipeline.process(&message).await.unwrap();
    let second = pipeline.process(&message).await.unwrap();

    assert_eq!(first.target, second.target);
    assert_eq!(store.put_count(), 2);
    assert_eq!(
        store.keys(BUCKET),
        vec!["derivatives/photos/cat_thumb.jpg", "photos/cat.jpg"]
    );
}

#[tokio::test]
async fn test_missing_original_is_not_found_and_writes_nothing() {
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = pipeline(store.clone());

    let err = pipeline
        .process(&delivery(sns_envelope(BUCKET, "gone.jpg")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotFound(_)));
    assert!(!err.is_retryable());
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_non_image_is_decode_error() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        StorageObjectRef::new(BUCKET, "fake.png"),
        b"definitely not a png".to_vec(),
        "image/png",
    );
    let pipeline = pipeline(store.clone());

    let err = pipeline
        .process(&delivery(sns_envelope(BUCKET, "fake.png")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_payload_error() {
    let pipeline = pipeline(Arc::new(MemoryObjectStore::new()));

    for body in [
        "not json".to_string(),
        r#"{"bucket":"uploads"}"#.to_string(),
        r#"{"Type":"Notification","Message":"{\"nope\":1}"}"#.to_string(),
        r#"{"bucket":"","key":"a.jpg"}"#.to_string(),
    ] {
        let err = pipeline.process(&delivery(body.clone())).await.unwrap_err();
        assert!(matches!(err, PipelineError::Payload(_)), "{body}");
    }
}

#[tokio::test]
async fn test_derivative_work_item_is_rejected() {
    let store = seeded_store(&["derivatives/photos/cat_thumb.jpg"]);
    let pipeline = pipeline(store.clone());

    let err = pipeline
        .process(&delivery(sns_envelope(
            BUCKET,
            "derivatives/photos/cat_thumb.jpg",
        )))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Payload(_)));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_storage_failures_are_transient() {
    let store = seeded_store(&["a.jpg"]);
    let pipeline = pipeline(store.clone());
    let message = delivery(sns_envelope(BUCKET, "a.jpg"));

    store.fail_next_gets(1);
    let err = pipeline.process(&message).await.unwrap_err();
    assert!(err.is_retryable());

    store.fail_next_puts(1);
    let err = pipeline.process(&message).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(store.put_count(), 0);

    pipeline.process(&message).await.unwrap();
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_slow_storage_times_out_as_transient() {
    let store = seeded_store(&["a.jpg"]);
    store.set_latency(Some(Duration::from_millis(200)));
    let pipeline = ThumbnailPipeline::new(
        store.clone(),
        Arc::new(ThumbnailProcessor::new(ThumbnailConfig::default())),
        DerivativeNaming::default(),
        Duration::from_millis(20),
    );

    let err = pipeline
        .process(&delivery(sns_envelope(BUCKET, "a.jpg")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transient(_)));
}

#[tokio::test]
async fn test_png_source_keeps_png_encoding() {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        StorageObjectRef::new(BUCKET, "icons/logo.PNG"),
        encoded_image(100, 400, image::ImageFormat::Png),
        "image/png",
    );
    let pipeline = pipeline(store.clone());

    let derivative = pipeline
        .process(&delivery(sns_envelope(BUCKET, "icons/logo.PNG")))
        .await
        .unwrap();

    assert_eq!(derivative.target.key, "derivatives/icons/logo_thumb.PNG");
    assert_eq!(derivative.content_type, "image/png");
    assert_eq!((derivative.width, derivative.height), (75, 300));
}
