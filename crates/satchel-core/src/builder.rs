//! The cache build pipeline.
//!
//! For every `(group, variant)` pair: fetch all members concurrently,
//! re-join them in file order, pre-transform each member, concatenate,
//! minify, post-transform the whole artifact, hash it, gzip it and publish
//! the result to the [`AssetCache`] in one write.

use crate::cache::{AssetCache, CacheEntry};
use crate::compression::{gzip, CompressionLevel, CompressionStats, CompressionStatsSnapshot};
use crate::error::{CacheError, Result};
use crate::fetch::{FileInfo, SourceFetcher};
use crate::group::{Group, GroupSet, Variant};
use crate::hash::ContentHash;
use crate::minify::MinifierSet;
use crate::transform::TransformContext;
use bytes::Bytes;
use chrono::{DateTime, Timelike, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Separator placed between concatenated members.
pub const MEMBER_SEPARATOR: &str = "\n";

/// Result of one `(group, variant)` build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A new entry was published.
    Stored {
        content_hash: ContentHash,
        bytes: usize,
        last_modified: DateTime<Utc>,
    },
    /// No member could be fetched; the previous entry (if any) was kept.
    Skipped,
}

/// Outcome of a build, tagged with its key.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub group: String,
    pub variant: String,
    pub outcome: BuildOutcome,
}

type BuildLock = Arc<tokio::sync::Mutex<()>>;

/// Builds cache entries for the configured groups.
pub struct Builder {
    groups: Arc<GroupSet>,
    cache: Arc<AssetCache>,
    fetcher: Arc<dyn SourceFetcher>,
    minifiers: MinifierSet,
    compression: CompressionLevel,
    compression_stats: CompressionStats,
    /// Serialises overlapping builds of the same pair.
    locks: Mutex<HashMap<(String, String), BuildLock>>,
}

impl Builder {
    /// Creates a builder with the default minifiers and best compression.
    pub fn new(
        groups: Arc<GroupSet>,
        cache: Arc<AssetCache>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            groups,
            cache,
            fetcher,
            minifiers: MinifierSet::default(),
            compression: CompressionLevel::default(),
            compression_stats: CompressionStats::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the minifiers.
    pub fn with_minifiers(mut self, minifiers: MinifierSet) -> Self {
        self.minifiers = minifiers;
        self
    }

    /// Sets the gzip level; [`CompressionLevel::None`] stores identity only.
    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    /// Returns the groups this builder serves.
    pub fn groups(&self) -> &Arc<GroupSet> {
        &self.groups
    }

    /// Returns the cache this builder publishes to.
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Returns gzip statistics.
    pub fn compression_stats(&self) -> CompressionStatsSnapshot {
        self.compression_stats.snapshot()
    }

    /// Rebuilds every variant of `group`, or of every group when `None`.
    ///
    /// Pairs build concurrently and independently.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownGroup`] for an unconfigured name.
    pub async fn build(&self, group: Option<&str>) -> Result<Vec<BuildReport>> {
        let targets: Vec<&Arc<Group>> = match group {
            Some(name) => vec![self
                .groups
                .get(name)
                .ok_or_else(|| CacheError::UnknownGroup(name.to_string()))?],
            None => self.groups.iter().collect(),
        };

        let builds = targets.into_iter().flat_map(|group| {
            group.variants().iter().map(move |variant| async move {
                BuildReport {
                    group: group.name().to_string(),
                    variant: variant.key().to_string(),
                    outcome: self.build_variant(group, variant).await,
                }
            })
        });
        Ok(join_all(builds).await)
    }

    /// Builds one `(group, variant)` pair.
    pub async fn build_variant(&self, group: &Group, variant: &Variant) -> BuildOutcome {
        let lock = self.lock_for(group.name(), variant.key());
        let _guard = lock.lock().await;
        let started = Instant::now();

        let fetched = join_all(
            group
                .sources()
                .iter()
                .map(|source| self.fetcher.fetch(source, group.path())),
        )
        .await;
        let total = fetched.len();
        let files: Vec<(usize, FileInfo)> = fetched
            .into_iter()
            .enumerate()
            .filter_map(|(index, file)| file.map(|f| (index, f)))
            .collect();

        let Some(last_modified) = files.iter().map(|(_, f)| f.modified).max() else {
            tracing::warn!(
                group = %group.name(),
                variant = %variant.key(),
                members = total,
                "No group members could be fetched, keeping previous entry"
            );
            return BuildOutcome::Skipped;
        };
        let last_modified = last_modified.with_nanosecond(0).unwrap_or(last_modified);

        let pre = group.pre_pipeline(variant.key());
        let contents = join_all(files.into_iter().map(|(index, file)| async move {
            let FileInfo {
                content, file_path, ..
            } = file;
            match pre {
                Some(pipeline) => {
                    let cx = TransformContext {
                        source: Some(&file_path),
                        index,
                        last: index + 1 == total,
                    };
                    pipeline.run(content, &cx).await
                }
                None => content,
            }
        }))
        .await;

        let concatenated = contents.join(MEMBER_SEPARATOR);
        let minified = if group.is_debug() {
            concatenated
        } else {
            self.minifiers.minify(group.data_type(), &concatenated)
        };
        let content = match group.post_pipeline(variant.key()) {
            Some(pipeline) => pipeline.run(minified, &TransformContext::WHOLE).await,
            None => minified,
        };

        let identity = Bytes::from(content.into_bytes());
        let content_hash = ContentHash::compute(&identity);
        let gzip = self.encode_gzip(identity.clone()).await;
        let bytes = identity.len();

        self.cache.store(
            group.name(),
            variant,
            CacheEntry::new(last_modified, content_hash, identity, gzip),
        );

        tracing::info!(
            group = %group.name(),
            variant = %variant.key(),
            bytes,
            hash = %content_hash.short(12),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built asset group"
        );

        BuildOutcome::Stored {
            content_hash,
            bytes,
            last_modified,
        }
    }

    async fn encode_gzip(&self, data: Bytes) -> Option<Bytes> {
        let level = self.compression.to_flate2()?;
        let input_len = data.len() as u64;

        match tokio::task::spawn_blocking(move || gzip(&data, level)).await {
            Ok(Ok(encoded)) => {
                self.compression_stats
                    .record_compress(input_len, encoded.len() as u64);
                Some(Bytes::from(encoded))
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "gzip encoding failed, storing identity only");
                self.compression_stats.record_failure();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "gzip task failed, storing identity only");
                self.compression_stats.record_failure();
                None
            }
        }
    }

    fn lock_for(&self, group: &str, variant: &str) -> BuildLock {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry((group.to_string(), variant.to_string()))
                .or_default(),
        )
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("groups", &self.groups.len())
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}
