//! WolfBrowse Error Types

use thiserror::Error;

/// Result type alias for WolfBrowse operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfBrowse error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Request errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Storage errors
    #[error("Storage backend error: {0}")]
    Backend(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Check if this error was caused by the caller rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}

impl From<s3::error::S3Error> for Error {
    fn from(err: s3::error::S3Error) -> Self {
        Error::Backend(err.to_string())
    }
}
