//! WolfBrowse - Directory Browser and Download Gateway for S3 Buckets
//!
//! Presents the flat key space of an S3-compatible bucket as a navigable
//! directory tree and hands out files either as redirects to presigned URLs
//! or as proxied streams.
//!
//! # Architecture
//!
//! A thin HTTP layer sits on top of the browser core, which talks to the
//! bucket through the [`storage::ObjectStorage`] trait. The storage client is
//! built once at startup and shared by every request.
//!
//! # Features
//!
//! - Virtual directories from delimiter listings, scoped to an optional base directory
//! - Concurrent per-file enrichment with stable ordering
//! - Presigned open/download redirects and proxied streaming downloads
//! - Extension-based content type classification
//! - Request cancellation propagated down to the storage calls

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod storage;
pub mod version;

pub use config::BrowserConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::browser::{Browser, DirectoryListing, FileInfo};
    pub use crate::config::BrowserConfig;
    pub use crate::error::{Error, Result};
    pub use crate::storage::{MemoryStorage, ObjectStorage, S3Storage};
    pub use crate::version::BuildInfo;
}
