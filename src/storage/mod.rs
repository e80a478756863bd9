//! Object Storage Module
//!
//! The seam between the browser core and an object store. The core only
//! needs four capabilities: a single-level delimiter listing, a presigned GET
//! URL, a metadata-only lookup and a streaming body read.
//!
//! Backends:
//! - **S3**: AWS S3 and S3-compatible services (MinIO, WolfDisk, Ceph RGW)
//! - **Memory**: in-memory bucket for tests

mod memory;
mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::Result;

/// Body of an object, read sequentially
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One object returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
    /// ETag, when the backend reports one
    pub etag: Option<String>,
}

/// Result of one single-level listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelListing {
    /// Synthetic subdirectories one level down, including the trailing delimiter
    pub common_prefixes: Vec<String>,
    /// Objects directly under the prefix
    pub objects: Vec<ObjectSummary>,
}

/// Metadata for a single object, without its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    /// Size in bytes
    pub size: u64,
    /// Content type declared by the backend
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Capabilities the browser needs from an object store
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Bucket name, for logging and health reporting
    fn bucket(&self) -> &str;

    /// List one hierarchy level under `prefix`, grouping deeper keys by
    /// `delimiter`. Returns a single page.
    async fn list_level(&self, prefix: &str, delimiter: &str) -> Result<LevelListing>;

    /// Produce a presigned GET URL for `key`
    async fn presign_get(&self, key: &str, expiry: Duration) -> Result<String>;

    /// Fetch object metadata. Fails with `Error::NotFound` for missing keys.
    async fn head(&self, key: &str) -> Result<ObjectHead>;

    /// Open the object body. Fails with `Error::NotFound` for missing keys.
    async fn open(&self, key: &str) -> Result<ByteStream>;
}

/// Parse an RFC 3339 timestamp as reported in S3 listings and headers
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
