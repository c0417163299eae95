//! Startup error types.

use satchel_core::CacheError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort node startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`NodeConfig`](crate::config::NodeConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A group record is invalid.
    #[error("group '{group}': {source}")]
    Group {
        group: String,
        #[source]
        source: CacheError,
    },

    /// A transform in a group record is invalid.
    #[error("group '{group}': invalid transform: {message}")]
    Transform { group: String, message: String },

    /// Resolving or building the cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A specialized Result type for node startup.
pub type Result<T> = std::result::Result<T, ConfigError>;
