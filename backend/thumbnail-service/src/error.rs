/// Error types for the thumbnail pipeline
///
/// Each boundary gets its own enum. `PipelineError` is the per-item taxonomy
/// the consumer uses to decide between "leave it for redelivery" and
/// "terminal, let the queue dead-letter it"; neither case acknowledges the
/// message.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Result type for per-item pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure of one work item
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Delivered payload is not a work item
    #[error("Malformed work item: {0}")]
    Payload(String),

    /// Source object vanished between upload and processing
    #[error("Source object not found: {0}")]
    NotFound(String),

    /// Source bytes are not a processable image
    #[error("Unprocessable image: {0}")]
    Decode(String),

    /// Storage, queue or network unavailability
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl PipelineError {
    /// Only transient failures can succeed on redelivery
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Payload(_) => "payload",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Decode(_) => "decode",
            PipelineError::Transient(_) => "transient",
        }
    }
}

/// Object storage boundary errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Transient(String),
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(object) => PipelineError::NotFound(object),
            StorageError::Transient(msg) => PipelineError::Transient(msg),
        }
    }
}

/// Fan-out transport failure
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct TransportError(pub String);

/// Work queue boundary errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("unknown or expired delivery token: {0}")]
    UnknownDeliveryToken(String),
}

/// Resize function errors
#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("resize task aborted: {0}")]
    Aborted(String),
}

impl From<ResizeError> for PipelineError {
    fn from(err: ResizeError) -> Self {
        match err {
            ResizeError::Decode(_) | ResizeError::Encode(_) => {
                PipelineError::Decode(err.to_string())
            }
            ResizeError::Aborted(_) => PipelineError::Transient(err.to_string()),
        }
    }
}

/// Storage-change event errors
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid object key encoding: {0}")]
    InvalidKey(String),
}

/// Escalation out of the consumer loop
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("queue unavailable after {failures} consecutive poll failures: {last_error}")]
    QueueUnavailable { failures: u32, last_error: QueueError },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors surfaced to the notification host
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Invalid storage event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ResponseError for NotifierError {
    fn status_code(&self) -> StatusCode {
        match self {
            NotifierError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            // 503 makes the host retry the whole invocation
            NotifierError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(PipelineError::Transient("s3 timeout".into()).is_retryable());
        assert!(!PipelineError::Payload("bad json".into()).is_retryable());
        assert!(!PipelineError::NotFound("b/k".into()).is_retryable());
        assert!(!PipelineError::Decode("not an image".into()).is_retryable());
    }

    #[test]
    fn test_storage_error_mapping() {
        let err: PipelineError = StorageError::NotFound("b/k".into()).into();
        assert_eq!(err.kind(), "not_found");

        let err: PipelineError = StorageError::Transient("503".into()).into();
        assert_eq!(err.kind(), "transient");
    }

    #[test]
    fn test_resize_error_mapping() {
        let err: PipelineError = ResizeError::Encode("gif".into()).into();
        assert_eq!(err.kind(), "decode");

        let err: PipelineError = ResizeError::Aborted("runtime shutting down".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_notifier_error_status_codes() {
        assert_eq!(
            NotifierError::InvalidEvent("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NotifierError::Transport(TransportError("sns down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
