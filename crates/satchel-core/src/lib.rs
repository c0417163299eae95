//! Asset cache for Satchel.
//!
//! Named groups of script, stylesheet or markup files are resolved from
//! their directory, fetched (locally or over HTTP), transformed per user
//! agent variant, minified, concatenated and stored with a content hash
//! and a gzip encoding. A file watcher rebuilds a group when one of its
//! local members changes.
//!
//! The HTTP side lives in `satchel-web`; this crate has no knowledge of
//! requests or responses.

mod builder;
mod cache;
mod compression;
mod error;
mod fetch;
mod group;
mod hash;
pub mod minify;
mod resolve;
mod transform;
mod watcher;

pub use builder::{BuildOutcome, BuildReport, Builder, MEMBER_SEPARATOR};
pub use cache::{
    AssetCache, CacheEntry, Encoding, GroupStamp, ManifestEntry, ManifestVariant, ServeMetrics,
    ServeStats,
};
pub use compression::{gzip, CompressionLevel, CompressionStats, CompressionStatsSnapshot};
pub use error::{CacheError, Result};
pub use fetch::{format_http_date, parse_http_date, DefaultFetcher, FetchConfig, FileInfo, SourceFetcher};
pub use group::{DataType, Group, GroupSet, GroupSpec, Member, Source, Variant, DEFAULT_VARIANT};
pub use hash::ContentHash;
pub use minify::{Minifier, MinifierSet};
pub use resolve::{list_directory, resolve};
pub use transform::{FnTransform, Manipulations, Pipeline, Transform, TransformContext};
pub use watcher::{run_rebuilds, spawn_watcher, TrackedFiles, WatchConfig, WatcherHandle};
