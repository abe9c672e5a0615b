/// Storage-change event endpoint
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::error::NotifierError;
use crate::models::UploadEvent;
use crate::services::notifier::{FilterOutcome, NotificationFilter, SkipReason};

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub published: usize,
    pub skipped: usize,
    pub results: Vec<RecordResult>,
}

#[derive(Debug, Serialize)]
pub struct RecordResult {
    pub bucket: String,
    pub key: String,
    /// `published` or `skipped`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl From<FilterOutcome> for RecordResult {
    fn from(outcome: FilterOutcome) -> Self {
        match outcome {
            FilterOutcome::Published(item) => RecordResult {
                bucket: item.source.bucket,
                key: item.source.key,
                outcome: "published",
                reason: None,
            },
            FilterOutcome::Skipped {
                bucket,
                key,
                reason,
            } => RecordResult {
                bucket,
                key,
                outcome: "skipped",
                reason: Some(reason),
            },
        }
    }
}

/// Run the notification filter over one storage-change event
///
/// Any 503 means nothing can be assumed about which records went out; the
/// sender should deliver the whole event again.
pub async fn receive_event(
    filter: web::Data<Arc<NotificationFilter>>,
    body: web::Bytes,
) -> Result<HttpResponse, NotifierError> {
    let event = UploadEvent::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejecting undecodable storage event");
        NotifierError::InvalidEvent(e.to_string())
    })?;

    let outcomes = filter.handle(&event).await?;

    let published = outcomes.iter().filter(|o| o.is_published()).count();
    let response = EventResponse {
        published,
        skipped: outcomes.len() - published,
        results: outcomes.into_iter().map(RecordResult::from).collect(),
    };

    Ok(HttpResponse::Ok().json(response))
}
