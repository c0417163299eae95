//! Asset cache error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while setting up or rebuilding the asset cache.
///
/// Per-file fetch problems are not represented here: a missing or
/// unreachable member is logged and skipped by the fetcher.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A group directory could not be listed during resolution.
    #[error("failed to list group directory {}: {source}", path.display())]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A route, member or variant pattern failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The requested group is not configured.
    #[error("group not found: {0}")]
    UnknownGroup(String),

    /// Two groups were configured with the same name.
    #[error("duplicate group: {0}")]
    DuplicateGroup(String),

    /// A data type name was not recognised.
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// The HTTP client for remote members could not be created.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The file watcher could not be created.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub(crate) fn invalid_pattern(pattern: &str, source: regex::Error) -> Self {
        CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        }
    }
}

/// A specialized Result type for asset cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
