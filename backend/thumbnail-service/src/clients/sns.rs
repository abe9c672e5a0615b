//! SNS fan-out transport
use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use tracing::debug;

use super::Publisher;
use crate::error::TransportError;

#[derive(Clone)]
pub struct SnsPublisher {
    client: Client,
}

impl SnsPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl Publisher for SnsPublisher {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        let output = self
            .client
            .publish()
            .topic_arn(topic)
            .subject(subject)
            .message(payload)
            .send()
            .await
            .map_err(|e| TransportError(format!("{}", DisplayErrorContext(&e))))?;

        debug!(
            topic,
            message_id = output.message_id().unwrap_or_default(),
            "Published to SNS"
        );
        Ok(())
    }
}
