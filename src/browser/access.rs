//! Access Resolver
//!
//! Single-object operations on fully-qualified storage keys: presigned URLs,
//! metadata lookups and streamed bodies. Keys are validated before any
//! backend round trip.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cancellable;
use super::mime;
use super::path::{self, DELIMITER};
use super::types::{Download, FileInfo, ObjectMetadata, ObjectStream, PresignedUrl};
use crate::error::{Error, Result};
use crate::storage::ObjectStorage;

/// Resolves object keys to URLs, metadata and bodies
#[derive(Clone)]
pub struct AccessResolver {
    storage: Arc<dyn ObjectStorage>,
    base_directory: String,
    presign_expiry: Duration,
}

impl AccessResolver {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        base_directory: impl Into<String>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            storage,
            base_directory: base_directory.into(),
            presign_expiry,
        }
    }

    /// Signed, time-limited GET URL for one object
    pub async fn presigned_url(&self, key: &str, cancel: &CancellationToken) -> Result<PresignedUrl> {
        self.validate_key(key)?;

        let url = cancellable(cancel, self.storage.presign_get(key, self.presign_expiry))
            .await
            .map_err(|e| self.log_failure("presign", key, e))?;

        debug!("Presigned {} for {}s", key, self.presign_expiry.as_secs());
        Ok(PresignedUrl {
            url,
            expires_in: self.presign_expiry,
        })
    }

    /// Object metadata without its body
    pub async fn metadata(&self, key: &str, cancel: &CancellationToken) -> Result<ObjectMetadata> {
        self.validate_key(key)?;

        let head = cancellable(cancel, self.storage.head(key))
            .await
            .map_err(|e| self.log_failure("head", key, e))?;

        let declared = head.content_type.filter(|ct| !ct.trim().is_empty());
        let content_type = declared
            .clone()
            .unwrap_or_else(|| mime::classify(key).to_string());

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: head.size,
            declared_content_type: declared,
            content_type,
            last_modified: head.last_modified,
            etag: head.etag,
        })
    }

    /// Metadata shaped as a listing entry
    pub async fn file_info(&self, key: &str, cancel: &CancellationToken) -> Result<FileInfo> {
        let meta = self.metadata(key, cancel).await?;

        Ok(FileInfo {
            name: path::file_name(&meta.key).to_string(),
            path: meta.key,
            size: meta.size,
            is_directory: false,
            mime_type: Some(meta.content_type),
            last_modified: meta.last_modified,
            etag: meta.etag,
        })
    }

    /// Sequential body stream. The stream ends with `Error::Cancelled` once
    /// `cancel` fires.
    pub async fn stream(&self, key: &str, cancel: &CancellationToken) -> Result<ObjectStream> {
        self.validate_key(key)?;

        let body = cancellable(cancel, self.storage.open(key))
            .await
            .map_err(|e| self.log_failure("open", key, e))?;

        Ok(ObjectStream::new(body, cancel.clone()))
    }

    /// Metadata and body together, for proxied downloads
    pub async fn download(&self, key: &str, cancel: &CancellationToken) -> Result<Download> {
        let meta = self.metadata(key, cancel).await?;
        let body = self.stream(key, cancel).await?;

        debug!("Streaming {} ({} bytes)", key, meta.size);
        Ok(Download {
            file_name: path::file_name(key).to_string(),
            content_type: meta.content_type,
            content_length: meta.size,
            body,
        })
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidInput("file path is required".into()));
        }
        if key.ends_with(DELIMITER) {
            return Err(Error::InvalidInput(format!("{} is a directory", key)));
        }
        if path::has_relative_segments(key) {
            return Err(Error::InvalidInput(format!(
                "{} contains empty, '.' or '..' segments",
                key
            )));
        }
        if !path::is_within_base(key, &self.base_directory) {
            return Err(Error::InvalidInput(format!(
                "{} is outside the browsable directory",
                key
            )));
        }
        Ok(())
    }

    fn log_failure(&self, op: &str, key: &str, err: Error) -> Error {
        match &err {
            Error::NotFound(_) => debug!("{} {}: not found", op, key),
            Error::Cancelled => debug!("{} {}: cancelled", op, key),
            _ => warn!(
                "{} {} in bucket {} failed: {}",
                op,
                key,
                self.storage.bucket(),
                err
            ),
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ListingAggregator;
    use crate::config::StorageConfig;
    use crate::storage::{ByteStream, LevelListing, MemoryStorage, ObjectHead, S3Storage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::{StreamExt, TryStreamExt};

    /// Backend whose bodies start but never deliver a second chunk
    struct StallingStorage;

    #[async_trait]
    impl ObjectStorage for StallingStorage {
        fn bucket(&self) -> &str {
            "stalling"
        }

        async fn list_level(&self, _prefix: &str, _delimiter: &str) -> Result<LevelListing> {
            Ok(LevelListing::default())
        }

        async fn presign_get(&self, key: &str, _expiry: Duration) -> Result<String> {
            Ok(format!("stall://{}", key))
        }

        async fn head(&self, _key: &str) -> Result<ObjectHead> {
            Ok(ObjectHead {
                size: 1 << 30,
                content_type: None,
                last_modified: None,
                etag: None,
            })
        }

        async fn open(&self, _key: &str) -> Result<ByteStream> {
            let first = futures::stream::once(async { Ok(Bytes::from_static(b"head")) });
            Ok(first.chain(futures::stream::pending()).boxed())
        }
    }

    fn resolver(storage: Arc<MemoryStorage>) -> AccessResolver {
        AccessResolver::new(storage, "", Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let resolver = resolver(Arc::new(MemoryStorage::new("test")));
        let cancel = CancellationToken::new();

        assert!(matches!(resolver.metadata("nope.txt", &cancel).await, Err(Error::NotFound(_))));
        assert!(matches!(resolver.stream("nope.txt", &cancel).await, Err(Error::NotFound(_))));
        assert!(matches!(resolver.download("nope.txt", &cancel).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fallback_content_type_matches_listing() {
        let storage = Arc::new(MemoryStorage::new("test"));
        storage.insert("docs/notes.md", "# hi");
        storage.insert("docs/blob", "??");
        let cancel = CancellationToken::new();

        let listing = ListingAggregator::new(storage.clone(), "", 0)
            .list("docs", &cancel)
            .await
            .unwrap();
        let resolver = resolver(storage);

        for entry in listing.regular_files() {
            let meta = resolver.metadata(&entry.path, &cancel).await.unwrap();
            assert!(meta.declared_content_type.is_none());
            assert_eq!(Some(meta.content_type), entry.mime_type);
        }
    }

    #[tokio::test]
    async fn test_declared_content_type_wins() {
        let storage = Arc::new(MemoryStorage::new("test"));
        storage.insert_with_content_type("data.txt", "a,b", "text/csv");
        storage.insert_with_content_type("blank.txt", "x", "  ");
        let resolver = resolver(storage);
        let cancel = CancellationToken::new();

        let meta = resolver.metadata("data.txt", &cancel).await.unwrap();
        assert_eq!(meta.content_type, "text/csv");
        assert_eq!(meta.declared_content_type.as_deref(), Some("text/csv"));

        let blank = resolver.metadata("blank.txt", &cancel).await.unwrap();
        assert_eq!(blank.content_type, "text/plain");
        assert!(blank.declared_content_type.is_none());
    }

    #[tokio::test]
    async fn test_invalid_keys_skip_backend() {
        // An offline backend would answer with Error::Backend
        let storage = Arc::new(MemoryStorage::new("test"));
        storage.set_offline(true);
        let resolver = AccessResolver::new(storage, "shared", Duration::from_secs(60));
        let cancel = CancellationToken::new();

        for key in [
            "",
            "shared/docs/",
            "private/a.txt",
            "sharedfiles/a.txt",
            "shared/../private/a.txt",
            "shared/./a.txt",
            "shared//a.txt",
        ] {
            assert!(
                matches!(resolver.metadata(key, &cancel).await, Err(Error::InvalidInput(_))),
                "key {:?}",
                key
            );
            assert!(matches!(
                resolver.presigned_url(key, &cancel).await,
                Err(Error::InvalidInput(_))
            ));
            assert!(matches!(resolver.stream(key, &cancel).await, Err(Error::InvalidInput(_))));
        }

        assert!(matches!(
            resolver.metadata("shared/a.txt", &cancel).await,
            Err(Error::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_dot_segments_cannot_escape_base_on_s3() {
        let config = StorageConfig {
            bucket: "media".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio123".to_string()),
            path_style: true,
        };
        let storage = Arc::new(S3Storage::new(&config).unwrap());
        let resolver = AccessResolver::new(storage, "shared", Duration::from_secs(60));
        let cancel = CancellationToken::new();

        assert!(matches!(
            resolver.presigned_url("shared/../private/secret.txt", &cancel).await,
            Err(Error::InvalidInput(_))
        ));

        let allowed = resolver
            .presigned_url("shared/docs/report.pdf", &cancel)
            .await
            .unwrap();
        assert!(allowed.url.contains("/media/shared/docs/report.pdf?"));
    }

    #[tokio::test]
    async fn test_presigned_url_uses_configured_expiry() {
        let storage = Arc::new(MemoryStorage::new("media"));
        storage.insert("clip.mp4", "x");
        let resolver = resolver(storage);

        let presigned = resolver
            .presigned_url("clip.mp4", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(presigned.expires_in, Duration::from_secs(600));
        assert_eq!(presigned.url, "memory://media/clip.mp4?X-Amz-Expires=600");
    }

    #[tokio::test]
    async fn test_file_info_for_single_file() {
        let storage = Arc::new(MemoryStorage::new("test"));
        storage.insert("a/b/report.pdf", vec![1u8; 42]);
        let resolver = resolver(storage);

        let info = resolver
            .file_info("a/b/report.pdf", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.name, "report.pdf");
        assert_eq!(info.path, "a/b/report.pdf");
        assert_eq!(info.size, 42);
        assert!(!info.is_directory);
        assert_eq!(info.mime_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_download_streams_whole_body() {
        let storage = Arc::new(MemoryStorage::new("test").with_chunk_size(3));
        storage.insert("logs/app.log", "0123456789");
        let resolver = resolver(storage);

        let download = resolver
            .download("logs/app.log", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(download.file_name, "app.log");
        assert_eq!(download.content_type, "text/plain");
        assert_eq!(download.content_length, 10);

        let chunks: Vec<Bytes> = download.body.try_collect().await.unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_returns_promptly() {
        let resolver = AccessResolver::new(Arc::new(StallingStorage), "", Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let mut stream = resolver.stream("big.iso", &cancel).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"head"));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("stream did not observe cancellation");
        assert!(matches!(next, Some(Err(Error::Cancelled))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let storage = Arc::new(MemoryStorage::new("test"));
        storage.insert("a.txt", "1");
        let resolver = resolver(storage);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(resolver.metadata("a.txt", &cancel).await, Err(Error::Cancelled)));
    }
}
