//! Notification filter
//!
//! Runs once per storage-change event. Every record is checked against the
//! relevance policy; relevant objects are published to the fan-out topic as a
//! work item, everything else is skipped with a reason. The filter keeps no
//! state between invocations and never writes to storage, so the host may
//! re-run it freely: duplicate publishes are absorbed by the worker's
//! idempotent overwrite.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::Publisher;
use crate::error::TransportError;
use crate::metrics;
use crate::models::{StorageObjectRef, UploadEvent, WorkItem};
use crate::services::thumbnail::DerivativeNaming;

/// Why an object was not queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Under the reserved prefix or carrying the derivative marker
    Derivative,
    /// Extension not in the allow-list
    UnsupportedExtension,
    /// Key could not be decoded from the notification
    InvalidKey,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Derivative => "derivative",
            SkipReason::UnsupportedExtension => "unsupported_extension",
            SkipReason::InvalidKey => "invalid_key",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SkipReason::Derivative => "Thumbnail file skipped",
            SkipReason::UnsupportedExtension => "Non-image file skipped",
            SkipReason::InvalidKey => "Undecodable object key skipped",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    Skipped(SkipReason),
}

/// Decides whether an uploaded object should be queued for processing
#[derive(Debug, Clone)]
pub struct RelevancePolicy {
    naming: DerivativeNaming,
    /// Lowercase, without leading dot
    extensions: Vec<String>,
}

impl RelevancePolicy {
    pub fn new(naming: DerivativeNaming, extensions: &[String]) -> Self {
        let extensions = extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self { naming, extensions }
    }

    pub fn naming(&self) -> &DerivativeNaming {
        &self.naming
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn check(&self, key: &str) -> Relevance {
        if self.naming.is_derivative(key) {
            return Relevance::Skipped(SkipReason::Derivative);
        }

        let lowered = key.to_lowercase();
        let allowed = self.extensions.iter().any(|ext| {
            lowered.len() > ext.len()
                && lowered.ends_with(ext.as_str())
                && lowered[..lowered.len() - ext.len()].ends_with('.')
        });

        if allowed {
            Relevance::Relevant
        } else {
            Relevance::Skipped(SkipReason::UnsupportedExtension)
        }
    }

    pub fn is_relevant(&self, key: &str) -> bool {
        self.check(key) == Relevance::Relevant
    }
}

/// Result for one record of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Published(WorkItem),
    Skipped {
        bucket: String,
        key: String,
        reason: SkipReason,
    },
}

impl FilterOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, FilterOutcome::Published(_))
    }
}

pub struct NotificationFilter {
    publisher: Arc<dyn Publisher>,
    policy: RelevancePolicy,
    topic: String,
    subject: String,
}

impl NotificationFilter {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        policy: RelevancePolicy,
        topic: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            policy,
            topic: topic.into(),
            subject: subject.into(),
        }
    }

    pub fn policy(&self) -> &RelevancePolicy {
        &self.policy
    }

    /// Filter every record of `event`, publishing one work item per relevant
    /// object.
    ///
    /// A publish failure aborts the invocation so the host retries the whole
    /// event; records published before the failure will be published again.
    pub async fn handle(&self, event: &UploadEvent) -> Result<Vec<FilterOutcome>, TransportError> {
        if event.records.is_empty() {
            debug!("Storage event carries no records");
        }

        let mut outcomes = Vec::with_capacity(event.records.len());

        for record in &event.records {
            let object = match record.object_ref() {
                Ok(object) => object,
                Err(e) => {
                    warn!(
                        bucket = %record.s3.bucket.name,
                        raw_key = %record.raw_key(),
                        error = %e,
                        "Skipping record with undecodable key"
                    );
                    metrics::record_filter_outcome(SkipReason::InvalidKey.as_str());
                    outcomes.push(FilterOutcome::Skipped {
                        bucket: record.s3.bucket.name.clone(),
                        key: record.raw_key().to_string(),
                        reason: SkipReason::InvalidKey,
                    });
                    continue;
                }
            };

            outcomes.push(self.handle_object(object).await?);
        }

        Ok(outcomes)
    }

    /// Filter and publish a single object
    pub async fn handle_object(
        &self,
        object: StorageObjectRef,
    ) -> Result<FilterOutcome, TransportError> {
        info!(bucket = %object.bucket, key = %object.key, "New file uploaded");

        if let Relevance::Skipped(reason) = self.policy.check(&object.key) {
            info!(
                bucket = %object.bucket,
                key = %object.key,
                reason = reason.as_str(),
                "{}",
                reason
            );
            metrics::record_filter_outcome(reason.as_str());
            return Ok(FilterOutcome::Skipped {
                bucket: object.bucket,
                key: object.key,
                reason,
            });
        }

        let item = WorkItem::new(object);
        if let Err(e) = self
            .publisher
            .publish(&self.topic, &self.subject, &item.to_payload())
            .await
        {
            warn!(
                bucket = %item.source.bucket,
                key = %item.source.key,
                topic = %self.topic,
                error = %e,
                "Failed to publish work item"
            );
            metrics::record_filter_outcome("publish_failed");
            return Err(e);
        }

        info!(
            bucket = %item.source.bucket,
            key = %item.source.key,
            topic = %self.topic,
            "Work item published"
        );
        metrics::record_filter_outcome("published");

        Ok(FilterOutcome::Published(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RelevancePolicy {
        let extensions: Vec<String> = ["jpg", ".jpeg", "PNG", "gif", "bmp", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        RelevancePolicy::new(DerivativeNaming::default(), &extensions)
    }

    #[test]
    fn test_extensions_are_normalised() {
        assert_eq!(
            policy().extensions(),
            &["jpg", "jpeg", "png", "gif", "bmp", "webp"]
        );
    }

    #[test]
    fn test_relevant_original() {
        assert_eq!(policy().check("photos/cat.jpg"), Relevance::Relevant);
        assert_eq!(policy().check("photos/CAT.JPeG"), Relevance::Relevant);
        assert_eq!(policy().check("a b/c.png"), Relevance::Relevant);
    }

    #[test]
    fn test_derivatives_are_skipped() {
        assert_eq!(
            policy().check("derivatives/photos/cat_thumb.jpg"),
            Relevance::Skipped(SkipReason::Derivative)
        );
        assert_eq!(
            policy().check("uploads/cat_thumb.jpg"),
            Relevance::Skipped(SkipReason::Derivative)
        );
    }

    #[test]
    fn test_non_images_are_skipped() {
        assert_eq!(
            policy().check("report.pdf"),
            Relevance::Skipped(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            policy().check("jpg"),
            Relevance::Skipped(SkipReason::UnsupportedExtension)
        );
        assert_eq!(
            policy().check("photos/notajpg"),
            Relevance::Skipped(SkipReason::UnsupportedExtension)
        );
    }

    #[test]
    fn test_derivative_of_any_relevant_key_is_not_relevant() {
        let policy = policy();
        for key in ["photos/cat.jpg", "x.PNG", "a/b/c.webp", "a.gif"] {
            assert!(policy.is_relevant(key));
            let derived = policy.naming().derivative_key(key);
            assert!(!policy.is_relevant(&derived), "{derived}");
        }
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(SkipReason::Derivative.to_string(), "Thumbnail file skipped");
        assert_eq!(
            SkipReason::UnsupportedExtension.to_string(),
            "Non-image file skipped"
        );
    }
}
