//! Browser Core
//!
//! Maps virtual directory paths onto a bucket's key hierarchy and resolves
//! individual objects for opening and downloading.
//!
//! Components:
//! - **path**: virtual path to storage prefix normalization
//! - **mime**: extension-based content type classification
//! - **ListingAggregator**: one-level listings with per-file fan-out
//! - **AccessResolver**: presigned URLs, metadata and streamed bodies
//!
//! [`Browser`] ties them together over a shared storage client.

pub mod mime;
pub mod path;

mod access;
mod listing;
mod types;

pub use access::AccessResolver;
pub use listing::ListingAggregator;
pub use types::{DirectoryListing, Download, FileInfo, ObjectMetadata, ObjectStream, PresignedUrl};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::BrowseConfig;
use crate::error::{Error, Result};
use crate::storage::ObjectStorage;

/// Race a backend call against the caller's token
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Directory browser over one bucket
pub struct Browser {
    storage: Arc<dyn ObjectStorage>,
    listing: ListingAggregator,
    access: AccessResolver,
}

impl Browser {
    /// Create a browser from a storage client and the browse settings
    pub fn new(storage: Arc<dyn ObjectStorage>, config: &BrowseConfig) -> Self {
        let base_directory = config.base_directory.trim_matches('/').to_string();
        let presign_expiry = Duration::from_secs(u64::from(config.presign_expiry_secs));

        Self {
            listing: ListingAggregator::new(
                Arc::clone(&storage),
                base_directory.clone(),
                config.listing_concurrency,
            ),
            access: AccessResolver::new(Arc::clone(&storage), base_directory, presign_expiry),
            storage,
        }
    }

    /// List a virtual directory
    pub async fn list_directory(
        &self,
        virtual_path: &str,
        cancel: &CancellationToken,
    ) -> Result<DirectoryListing> {
        self.listing.list(virtual_path, cancel).await
    }

    /// Presigned URL to redirect an open or download request to
    pub async fn resolve_download_target(
        &self,
        file_path: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        Ok(self.access.presigned_url(file_path, cancel).await?.url)
    }

    /// Content type, exact length and body for a proxied download
    pub async fn stream_download(
        &self,
        file_path: &str,
        cancel: &CancellationToken,
    ) -> Result<Download> {
        self.access.download(file_path, cancel).await
    }

    /// Listing-style entry for one file
    pub async fn get_file_info(&self, file_path: &str, cancel: &CancellationToken) -> Result<FileInfo> {
        self.access.file_info(file_path, cancel).await
    }

    /// Name of the browsed bucket
    pub fn bucket(&self) -> &str {
        self.storage.bucket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn browser(base_directory: &str) -> Browser {
        let storage = Arc::new(MemoryStorage::new("files"));
        storage.insert("shared/docs/guide.pdf", vec![0u8; 128]);
        storage.insert("shared/readme.txt", "hello");
        storage.insert("private/secret.txt", "no");

        let config = BrowseConfig {
            base_directory: base_directory.to_string(),
            presign_expiry_secs: 900,
            listing_concurrency: 8,
        };
        Browser::new(storage, &config)
    }

    #[tokio::test]
    async fn test_browse_then_download() {
        let browser = browser("/shared/");
        let cancel = CancellationToken::new();

        let root = browser.list_directory("/", &cancel).await.unwrap();
        let names: Vec<_> = root.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "readme.txt"]);

        let docs = browser.list_directory(&root.files[0].path, &cancel).await.unwrap();
        assert_eq!(docs.files.len(), 1);

        let target = browser
            .resolve_download_target(&docs.files[0].path, &cancel)
            .await
            .unwrap();
        assert_eq!(target, "memory://files/shared/docs/guide.pdf?X-Amz-Expires=900");

        let download = browser.stream_download("shared/readme.txt", &cancel).await.unwrap();
        assert_eq!(download.content_length, 5);
    }

    #[tokio::test]
    async fn test_base_directory_blocks_other_keys() {
        let browser = browser("shared");
        let cancel = CancellationToken::new();

        assert!(matches!(
            browser.get_file_info("private/secret.txt", &cancel).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(browser.get_file_info("shared/readme.txt", &cancel).await.is_ok());
        assert_eq!(browser.bucket(), "files");
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cancellable(&cancel, async { Ok::<_, Error>(1) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
