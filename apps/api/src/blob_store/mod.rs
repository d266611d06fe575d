//! Blob Store: durable object storage for uploaded images.
//!
//! Objects are addressed by `s3://{bucket}/{key}` references. Only the orchestrator
//! talks to this module; handlers never touch S3 directly.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod s3;

pub use s3::S3BlobStore;

pub const URI_SCHEME: &str = "s3://";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid object reference: {0}")]
    InvalidRef(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes a new object and returns its reference URI.
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> Result<String, BlobError>;

    /// Reads an object by reference, giving up after `timeout`.
    async fn get(&self, uri: &str, timeout: Duration) -> Result<Bytes, BlobError>;
}

/// Splits `s3://bucket/key` into its bucket and key.
pub fn parse_uri(uri: &str) -> Result<(&str, &str), BlobError> {
    let rest = uri
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| BlobError::InvalidRef(uri.to_string()))?;
    match rest.split_once('/') {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok((bucket, key)),
        _ => Err(BlobError::InvalidRef(uri.to_string())),
    }
}

pub fn format_uri(bucket: &str, key: &str) -> String {
    format!("{URI_SCHEME}{bucket}/{key}")
}

/// Builds a collision-free object name: `uploads/{uuid}{.ext}`.
/// The uploader's filename only contributes its extension.
pub fn object_name_for(original_filename: &str) -> String {
    let extension = std::path::Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("uploads/{}{}", uuid::Uuid::new_v4(), extension)
}
