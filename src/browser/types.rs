//! Listing and download types

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::storage::ByteStream;

/// One row of a directory listing, or the info for a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Leaf name (no prefix, no trailing slash)
    pub name: String,
    /// Full storage key, or the common prefix for directories
    pub path: String,
    /// Size in bytes, 0 for directories
    pub size: u64,
    pub is_directory: bool,
    /// Content type, files only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl FileInfo {
    /// Directory entry for a common prefix
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size: 0,
            is_directory: true,
            mime_type: None,
            last_modified: None,
            etag: None,
        }
    }
}

/// Result of listing one virtual directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Virtual path as requested
    pub path: String,
    /// Directories first, then files
    pub files: Vec<FileInfo>,
}

impl DirectoryListing {
    pub fn directories(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| f.is_directory)
    }

    pub fn regular_files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.iter().filter(|f| !f.is_directory)
    }
}

/// Metadata for one object, resolved without downloading it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    /// Content type reported by the backend, if any
    pub declared_content_type: Option<String>,
    /// Declared content type, or the extension-based classification
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A signed, time-limited URL for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: Duration,
}

/// Object body that ends early with `Error::Cancelled` when the caller's
/// token fires. Dropping it releases the backend connection.
pub struct ObjectStream {
    inner: ByteStream,
}

impl ObjectStream {
    pub(crate) fn new(body: ByteStream, cancel: CancellationToken) -> Self {
        let guarded = stream::unfold(Some((body, cancel)), |state| async move {
            let (mut body, cancel) = match state {
                Some(state) => state,
                None => return None,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Some((Err(Error::Cancelled), None)),
                item = body.next() => item.map(|item| (item, Some((body, cancel)))),
            }
        });

        Self {
            inner: guarded.boxed(),
        }
    }
}

impl Stream for ObjectStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream").finish_non_exhaustive()
    }
}

/// Everything needed to proxy a download
#[derive(Debug)]
pub struct Download {
    /// Leaf name, for `Content-Disposition`
    pub file_name: String,
    pub content_type: String,
    pub content_length: u64,
    pub body: ObjectStream,
}
