use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use super::{format_uri, parse_uri, BlobError, BlobStore};

/// S3 / MinIO backed blob store bound to a single bucket for writes.
#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> Result<String, BlobError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobError::Backend(format!("S3 upload failed: {e}")))?;

        debug!("Stored {size} bytes at s3://{}/{}", self.bucket, name);
        Ok(format_uri(&self.bucket, name))
    }

    async fn get(&self, uri: &str, timeout: Duration) -> Result<Bytes, BlobError> {
        let (bucket, key) = parse_uri(uri)?;

        let fetch = async {
            let output = match self.client.get_object().bucket(bucket).key(key).send().await {
                Ok(output) => output,
                Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
                    return Err(BlobError::NotFound(uri.to_string()));
                }
                Err(e) => return Err(BlobError::Backend(format!("S3 download failed: {e}"))),
            };
            output
                .body
                .collect()
                .await
                .map(|data| data.into_bytes())
                .map_err(|e| BlobError::Backend(format!("S3 body read failed: {e}")))
        };

        tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| BlobError::Timeout(timeout))?
    }
}
