//! S3-compatible object storage via rust-s3
//!
//! The crate is built without `fail-on-err`, so non-2xx responses come back
//! as `Ok` with a status code and are mapped here.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::{debug, info};

use super::{parse_timestamp, ByteStream, LevelListing, ObjectHead, ObjectStorage, ObjectSummary};
use crate::config::StorageConfig;
use crate::error::{Error, Result};

/// S3 bucket client
pub struct S3Storage {
    bucket: Box<Bucket>,
}

impl S3Storage {
    /// Build a bucket client from configuration. No network calls are made
    /// unless credentials have to come from instance metadata.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| Error::Config(format!("Invalid region {}: {}", config.region, e)))?,
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("Failed to resolve S3 credentials: {}", e)))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| Error::Config(format!("Invalid bucket {}: {}", config.bucket, e)))?;

        if config.path_style {
            bucket = bucket.with_path_style();
        }

        info!(
            "S3 storage ready: bucket={} region={} endpoint={}",
            config.bucket,
            config.region,
            config.endpoint.as_deref().unwrap_or("(aws)")
        );

        Ok(Self { bucket })
    }
}

/// Map a non-success status for a single-key request
fn check_status(status: u16, key: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(Error::NotFound(key.to_string())),
        other => Err(Error::Backend(format!("S3 returned HTTP {} for {}", other, key))),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn list_level(&self, prefix: &str, delimiter: &str) -> Result<LevelListing> {
        let (result, status) = self
            .bucket
            .list_page(prefix.to_string(), Some(delimiter.to_string()), None, None, None)
            .await?;

        if !(200..300).contains(&status) {
            return Err(Error::Backend(format!(
                "ListObjectsV2 on {} returned HTTP {}",
                self.bucket.name, status
            )));
        }

        debug!(
            "ListObjectsV2 prefix={:?}: {} prefixes, {} objects, truncated={}",
            prefix,
            result.common_prefixes.as_ref().map(Vec::len).unwrap_or(0),
            result.contents.len(),
            result.is_truncated
        );

        Ok(LevelListing {
            common_prefixes: result
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|cp| cp.prefix)
                .collect(),
            objects: result
                .contents
                .into_iter()
                .map(|obj| ObjectSummary {
                    last_modified: parse_timestamp(&obj.last_modified),
                    key: obj.key,
                    size: obj.size,
                    etag: obj.e_tag,
                })
                .collect(),
        })
    }

    async fn presign_get(&self, key: &str, expiry: Duration) -> Result<String> {
        let expiry_secs = u32::try_from(expiry.as_secs()).unwrap_or(u32::MAX);
        Ok(self.bucket.presign_get(key, expiry_secs, None).await?)
    }

    async fn head(&self, key: &str) -> Result<ObjectHead> {
        let (head, status) = self.bucket.head_object(key).await?;
        check_status(status, key)?;

        Ok(ObjectHead {
            size: head.content_length.unwrap_or(0).max(0) as u64,
            content_type: head.content_type,
            last_modified: head.last_modified.as_deref().and_then(parse_timestamp),
            etag: head.e_tag,
        })
    }

    async fn open(&self, key: &str) -> Result<ByteStream> {
        let response = self.bucket.get_object_stream(key).await?;
        check_status(response.status_code, key)?;

        Ok(response.bytes.map(|chunk| chunk.map_err(Error::from)).boxed())
    }
}
