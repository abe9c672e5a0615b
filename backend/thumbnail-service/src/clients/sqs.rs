//! SQS work queue
//!
//! The receipt handle of each received message is its delivery token. SQS
//! hides a received message for the queue's visibility timeout (or the
//! override configured here) and redelivers it if it is not deleted in time.
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use std::time::Duration;
use tracing::warn;

use super::WorkQueue;
use crate::error::QueueError;
use crate::models::QueueMessage;

/// Upper bounds enforced by ReceiveMessage
const MAX_BATCH: u32 = 10;
const MAX_WAIT_SECS: u64 = 20;

#[derive(Clone)]
pub struct SqsWorkQueue {
    client: Client,
    queue_url: String,
    visibility_timeout: Option<Duration>,
}

impl SqsWorkQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            visibility_timeout: None,
        }
    }

    pub fn from_config(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::new(Client::new(config), queue_url)
    }

    /// Override the queue's default visibility timeout for received messages
    pub fn with_visibility_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl WorkQueue for SqsWorkQueue {
    async fn poll(&self, max_items: u32, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_items.clamp(1, MAX_BATCH) as i32)
            .wait_time_seconds(wait.as_secs().min(MAX_WAIT_SECS) as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount);

        if let Some(timeout) = self.visibility_timeout {
            request = request.visibility_timeout(timeout.as_secs() as i32);
        }

        let output = request
            .send()
            .await
            .map_err(|e| QueueError::Unavailable(format!("{}", DisplayErrorContext(&e))))?;

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let message_id = message.message_id.clone().unwrap_or_default();

            let Some(delivery_token) = message.receipt_handle.clone() else {
                warn!(message_id = %message_id, "Received message without receipt handle, ignoring");
                continue;
            };

            let receive_count = message
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|count| count.parse().ok())
                .unwrap_or(1);

            messages.push(QueueMessage {
                message_id,
                body: message.body.unwrap_or_default(),
                delivery_token,
                receive_count,
            });
        }

        Ok(messages)
    }

    async fn delete(&self, delivery_token: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(delivery_token)
            .send()
            .await
            .map_err(|e| {
                let invalid = e
                    .as_service_error()
                    .map(|se| se.is_receipt_handle_is_invalid())
                    .unwrap_or(false);
                if invalid {
                    QueueError::UnknownDeliveryToken(delivery_token.to_string())
                } else {
                    QueueError::Unavailable(format!("{}", DisplayErrorContext(&e)))
                }
            })?;
        Ok(())
    }
}
