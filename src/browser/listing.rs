//! Listing Aggregator
//!
//! Turns one delimiter listing into a merged set of directory and file
//! entries. Each file is enriched by its own task; results land in a slot
//! indexed by the object's position, so files keep the backend's order.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::mime;
use super::path::{self, DELIMITER};
use super::types::{DirectoryListing, FileInfo};
use crate::error::{Error, Result};
use crate::storage::{ObjectStorage, ObjectSummary};

/// Builds directory listings from single-level storage listings
#[derive(Clone)]
pub struct ListingAggregator {
    storage: Arc<dyn ObjectStorage>,
    base_directory: String,
    max_concurrency: usize,
}

impl ListingAggregator {
    /// Create an aggregator. `max_concurrency` of 0 spawns one task per file
    /// with no cap.
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        base_directory: impl Into<String>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            storage,
            base_directory: base_directory.into(),
            max_concurrency,
        }
    }

    /// List one virtual directory
    pub async fn list(
        &self,
        virtual_path: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryListing> {
        let prefix = path::listing_prefix(virtual_path, &self.base_directory);

        let level = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.storage.list_level(&prefix, DELIMITER) => result.map_err(|e| {
                warn!("Listing {:?} in bucket {} failed: {}", prefix, self.storage.bucket(), e);
                e
            })?,
        };

        let mut files: Vec<FileInfo> =
            Vec::with_capacity(level.common_prefixes.len() + level.objects.len());

        for common_prefix in level.common_prefixes {
            let name = directory_name(&common_prefix, &prefix);
            if name.is_empty() {
                debug!("Skipping empty directory name for prefix {:?}", common_prefix);
                continue;
            }
            files.push(FileInfo::directory(name, common_prefix));
        }
        let directory_count = files.len();

        let candidates: Vec<ObjectSummary> = level
            .objects
            .into_iter()
            .filter(|obj| !obj.key.ends_with(DELIMITER) && obj.key != prefix)
            .collect();

        files.extend(self.enrich(candidates, &prefix, cancel).await?);

        debug!(
            "Listed {:?} -> prefix {:?}: {} directories, {} files",
            virtual_path,
            prefix,
            directory_count,
            files.len() - directory_count
        );

        Ok(DirectoryListing {
            path: virtual_path.to_string(),
            files,
        })
    }

    /// Fan out one task per object and join them into positional slots
    async fn enrich(
        &self,
        objects: Vec<ObjectSummary>,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInfo>> {
        let count = objects.len();
        let prefix: Arc<str> = Arc::from(prefix);
        let limiter = (self.max_concurrency > 0).then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        let mut tasks = JoinSet::new();
        for (index, object) in objects.into_iter().enumerate() {
            let prefix = Arc::clone(&prefix);
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                (index, file_entry(object, &prefix))
            });
        }

        let mut slots: Vec<Option<FileInfo>> = (0..count).map(|_| None).collect();
        loop {
            // Dropping the JoinSet on early return aborts the remaining tasks
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                joined = tasks.join_next() => joined,
            };

            match joined {
                Some(Ok((index, entry))) => slots[index] = Some(entry),
                Some(Err(e)) => return Err(Error::Internal(format!("listing task failed: {}", e))),
                None => break,
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Directory name for a common prefix: the query prefix and one trailing
/// delimiter removed
fn directory_name(common_prefix: &str, prefix: &str) -> String {
    let name = common_prefix.strip_prefix(prefix).unwrap_or(common_prefix);
    name.strip_suffix(DELIMITER).unwrap_or(name).to_string()
}

/// File entry for a listed object
fn file_entry(object: ObjectSummary, prefix: &str) -> FileInfo {
    let name = object
        .key
        .strip_prefix(prefix)
        .unwrap_or(&object.key)
        .to_string();
    let mime_type = mime::classify(&name).to_string();

    FileInfo {
        name,
        path: object.key,
        size: object.size,
        is_directory: false,
        mime_type: Some(mime_type),
        last_modified: object.last_modified,
        etag: object.etag,
    }
}
