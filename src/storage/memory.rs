//! In-memory object storage
//!
//! Mimics S3 listing semantics (sorted keys, delimiter grouping, a single
//! page of at most `max_keys` entries) so the browser core can be exercised
//! without a network.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;

use super::{ByteStream, LevelListing, ObjectHead, ObjectStorage, ObjectSummary};
use crate::error::{Error, Result};

/// Default page size, matching S3's ListObjectsV2 limit
const DEFAULT_MAX_KEYS: usize = 1000;

/// Default body chunk size for `open`
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// In-memory bucket
pub struct MemoryStorage {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    offline: AtomicBool,
    max_keys: usize,
    chunk_size: usize,
}

impl MemoryStorage {
    /// Create an empty bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
            max_keys: DEFAULT_MAX_KEYS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Limit the number of entries returned by one listing call
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// Set the chunk size used when streaming bodies
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Store an object without a declared content type
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.store(key.into(), data.into(), None);
    }

    /// Store an object with a declared content type
    pub fn insert_with_content_type(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) {
        self.store(key.into(), data.into(), Some(content_type.into()));
    }

    /// Simulate an unreachable backend: every call fails with `Error::Backend`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn store(&self, key: String, data: Bytes, content_type: Option<String>) {
        let object = StoredObject {
            data,
            content_type,
            last_modified: Utc::now(),
        };
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, object);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!("bucket {} is unreachable", self.bucket)));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<StoredObject> {
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_level(&self, prefix: &str, delimiter: &str) -> Result<LevelListing> {
        self.check_online()?;

        let objects = self.read();
        let mut listing = LevelListing::default();
        let mut returned = 0;

        for (key, object) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) || returned >= self.max_keys {
                break;
            }

            let after_prefix = &key[prefix.len()..];
            if !delimiter.is_empty() {
                if let Some(pos) = after_prefix.find(delimiter) {
                    let common = format!("{}{}{}", prefix, &after_prefix[..pos], delimiter);
                    // Keys are sorted, so equal prefixes are adjacent
                    if listing.common_prefixes.last() != Some(&common) {
                        listing.common_prefixes.push(common);
                        returned += 1;
                    }
                    continue;
                }
            }

            listing.objects.push(ObjectSummary {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
                etag: None,
            });
            returned += 1;
        }

        Ok(listing)
    }

    async fn presign_get(&self, key: &str, expiry: Duration) -> Result<String> {
        self.check_online()?;
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}",
            self.bucket,
            key,
            expiry.as_secs()
        ))
    }

    async fn head(&self, key: &str) -> Result<ObjectHead> {
        self.check_online()?;
        let object = self.get(key)?;
        Ok(ObjectHead {
            size: object.data.len() as u64,
            content_type: object.content_type,
            last_modified: Some(object.last_modified),
            etag: None,
        })
    }

    async fn open(&self, key: &str) -> Result<ByteStream> {
        self.check_online()?;
        let object = self.get(key)?;

        let chunks: Vec<Result<Bytes>> = object
            .data
            .chunks(self.chunk_size)
            .map(|chunk| Ok(object.data.slice_ref(chunk)))
            .collect();

        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn sample() -> MemoryStorage {
        let storage = MemoryStorage::new("test");
        storage.insert("a/", "");
        storage.insert("a/readme.txt", "0123456789");
        storage.insert("a/b/one.bin", "1");
        storage.insert("a/b/two.bin", "2");
        storage.insert("a/c/deep/three.bin", "3");
        storage.insert("root.txt", "r");
        storage
    }

    #[tokio::test]
    async fn test_list_level_groups_by_delimiter() {
        let storage = sample();
        let listing = storage.list_level("a/", "/").await.unwrap();

        assert_eq!(listing.common_prefixes, vec!["a/b/", "a/c/"]);
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/", "a/readme.txt"]);
        assert_eq!(listing.objects[1].size, 10);
    }

    #[tokio::test]
    async fn test_list_level_at_root() {
        let storage = sample();
        let listing = storage.list_level("", "/").await.unwrap();

        assert_eq!(listing.common_prefixes, vec!["a/"]);
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "root.txt");
    }

    #[tokio::test]
    async fn test_list_level_single_page() {
        let storage = MemoryStorage::new("test").with_max_keys(3);
        for i in 0..10 {
            storage.insert(format!("f{:02}", i), "x");
        }
        let listing = storage.list_level("", "/").await.unwrap();
        assert_eq!(listing.objects.len(), 3);
    }

    #[tokio::test]
    async fn test_head_and_open() {
        let storage = MemoryStorage::new("test").with_chunk_size(4);
        storage.insert_with_content_type("doc.bin", "0123456789", "application/x-custom");

        let head = storage.head("doc.bin").await.unwrap();
        assert_eq!(head.size, 10);
        assert_eq!(head.content_type.as_deref(), Some("application/x-custom"));

        let chunks: Vec<Bytes> = storage.open("doc.bin").await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let storage = sample();
        assert!(matches!(storage.head("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(storage.open("nope").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offline_bucket_fails_with_backend_error() {
        let storage = sample();
        storage.set_offline(true);
        assert!(matches!(storage.list_level("", "/").await, Err(Error::Backend(_))));
        assert!(matches!(storage.head("root.txt").await, Err(Error::Backend(_))));
    }
}
