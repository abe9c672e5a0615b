//! S3-backed object storage
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::ObjectStore;
use crate::error::StorageError;
use crate::models::StorageObjectRef;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, object: &StorageObjectRef) -> Result<Bytes, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                    || err
                        .raw_response()
                        .map(|resp| resp.status().as_u16() == 404)
                        .unwrap_or(false);

                if missing {
                    return Err(StorageError::NotFound(object.to_string()));
                }
                return Err(StorageError::Transient(format!(
                    "GetObject {object}: {}",
                    DisplayErrorContext(&err)
                )));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Transient(format!("reading body of {object}: {e}")))?
            .into_bytes();

        debug!(bucket = %object.bucket, key = %object.key, size = data.len(), "Fetched object");
        Ok(data)
    }

    async fn put(
        &self,
        object: &StorageObjectRef,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StorageError::Transient(format!("PutObject {object}: {}", DisplayErrorContext(&e)))
            })?;

        debug!(bucket = %object.bucket, key = %object.key, size, content_type, "Stored object");
        Ok(())
    }
}
