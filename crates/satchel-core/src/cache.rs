//! Process-wide store of built artifacts.
//!
//! Entries are keyed by `(group, variant)` and held behind `Arc`s. A build
//! publishes its result with a single map write, so readers observe either
//! the previous entry or the complete new one.

use crate::group::Variant;
use crate::hash::ContentHash;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Content encodings stored for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Uncompressed UTF-8.
    Identity,
    /// gzip.
    Gzip,
}

impl Encoding {
    /// Returns the `Content-Encoding` value, `None` for identity.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some("gzip"),
        }
    }
}

/// A finished artifact for one `(group, variant)` pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Newest modification time among the members that were read, truncated to seconds.
    pub last_modified: DateTime<Utc>,
    /// Digest of the identity bytes.
    pub content_hash: ContentHash,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    identity: Bytes,
    gzip: Option<Bytes>,
}

impl CacheEntry {
    /// Creates an entry from its encodings.
    pub fn new(
        last_modified: DateTime<Utc>,
        content_hash: ContentHash,
        identity: Bytes,
        gzip: Option<Bytes>,
    ) -> Self {
        Self {
            last_modified,
            content_hash,
            built_at: Utc::now(),
            identity,
            gzip,
        }
    }

    /// Returns the bytes stored for `encoding`.
    pub fn encoding(&self, encoding: Encoding) -> Option<&Bytes> {
        match encoding {
            Encoding::Identity => Some(&self.identity),
            Encoding::Gzip => self.gzip.as_ref(),
        }
    }

    /// Returns the uncompressed artifact.
    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    /// Returns the encodings present, identity first.
    pub fn encodings(&self) -> Vec<Encoding> {
        let mut encodings = vec![Encoding::Identity];
        if self.gzip.is_some() {
            encodings.push(Encoding::Gzip);
        }
        encodings
    }
}

/// Most recent build information for a group, for cache-busting URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupStamp {
    /// Last-modified time of the most recently built artifact.
    pub last_modified: DateTime<Utc>,
    /// Content hash of the most recently built artifact.
    pub content_hash: ContentHash,
}

/// One row of [`AssetCache::manifest`].
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub group: String,
    pub last_modified: DateTime<Utc>,
    pub content_hash: ContentHash,
    pub variants: Vec<ManifestVariant>,
}

/// Per-variant part of a manifest row.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestVariant {
    pub key: String,
    pub content_hash: ContentHash,
    pub bytes: usize,
    pub encodings: Vec<Encoding>,
}

struct VariantSlot {
    variant: Variant,
    entry: Arc<CacheEntry>,
}

#[derive(Default)]
struct GroupSlot {
    /// Insertion order is the negotiation order.
    variants: Vec<VariantSlot>,
    stamp: Option<GroupStamp>,
}

/// Serving statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServeStats {
    /// Responses served from the cache with a body.
    pub served: u64,
    /// Of those, responses served gzip-encoded.
    pub compressed: u64,
    /// 304 responses.
    pub not_modified: u64,
    /// Group requests with no cached variant, handed to the next handler.
    pub passed_through: u64,
}

/// Serving metrics for monitoring.
#[derive(Debug, Default)]
pub struct ServeMetrics {
    served: AtomicU64,
    compressed: AtomicU64,
    not_modified: AtomicU64,
    passed_through: AtomicU64,
}

impl ServeMetrics {
    /// Records a 200 response.
    pub fn record_served(&self, encoding: Encoding) {
        self.served.fetch_add(1, Ordering::Relaxed);
        if encoding != Encoding::Identity {
            self.compressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a 304 response.
    pub fn record_not_modified(&self) {
        self.not_modified.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a request handed to the next handler.
    pub fn record_pass_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns current metrics.
    pub fn snapshot(&self) -> ServeStats {
        ServeStats {
            served: self.served.load(Ordering::Relaxed),
            compressed: self.compressed.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
        }
    }
}

/// The shared asset cache.
#[derive(Default)]
pub struct AssetCache {
    groups: RwLock<HashMap<String, GroupSlot>>,
    metrics: ServeMetrics,
}

impl AssetCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `entry` for `(group, variant)`, replacing any previous entry.
    ///
    /// A replaced variant keeps its negotiation position.
    pub fn store(&self, group: &str, variant: &Variant, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        let mut groups = self.groups.write();
        let slot = groups.entry(group.to_string()).or_default();

        match slot
            .variants
            .iter_mut()
            .find(|v| v.variant.key() == variant.key())
        {
            Some(existing) => existing.entry = Arc::clone(&entry),
            None => slot.variants.push(VariantSlot {
                variant: variant.clone(),
                entry: Arc::clone(&entry),
            }),
        }
        slot.stamp = Some(GroupStamp {
            last_modified: entry.last_modified,
            content_hash: entry.content_hash,
        });
        entry
    }

    /// Returns the entry for an exact `(group, variant)` key.
    pub fn get(&self, group: &str, variant: &str) -> Option<Arc<CacheEntry>> {
        self.groups.read().get(group).and_then(|slot| {
            slot.variants
                .iter()
                .find(|v| v.variant.key() == variant)
                .map(|v| Arc::clone(&v.entry))
        })
    }

    /// Selects the first cached variant of `group`, in insertion order,
    /// whose pattern matches `user_agent`.
    pub fn negotiate(&self, group: &str, user_agent: &str) -> Option<(String, Arc<CacheEntry>)> {
        self.groups.read().get(group).and_then(|slot| {
            slot.variants
                .iter()
                .find(|v| v.variant.matches(user_agent))
                .map(|v| (v.variant.key().to_string(), Arc::clone(&v.entry)))
        })
    }

    /// Returns the cached variant keys of `group` in insertion order.
    pub fn variant_keys(&self, group: &str) -> Vec<String> {
        self.groups
            .read()
            .get(group)
            .map(|slot| {
                slot.variants
                    .iter()
                    .map(|v| v.variant.key().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the last build timestamp and content hash for `group`.
    pub fn stamp(&self, group: &str) -> Option<GroupStamp> {
        self.groups.read().get(group).and_then(|slot| slot.stamp)
    }

    /// Lists every built group, sorted by name.
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        let groups = self.groups.read();
        let mut rows: Vec<ManifestEntry> = groups
            .iter()
            .filter_map(|(name, slot)| {
                let stamp = slot.stamp?;
                Some(ManifestEntry {
                    group: name.clone(),
                    last_modified: stamp.last_modified,
                    content_hash: stamp.content_hash,
                    variants: slot
                        .variants
                        .iter()
                        .map(|v| ManifestVariant {
                            key: v.variant.key().to_string(),
                            content_hash: v.entry.content_hash,
                            bytes: v.entry.identity.len(),
                            encodings: v.entry.encodings(),
                        })
                        .collect(),
                })
            })
            .collect();
        rows.sort_by(|a, b| a.group.cmp(&b.group));
        rows
    }

    /// Returns the number of cached `(group, variant)` entries.
    pub fn len(&self) -> usize {
        self.groups.read().values().map(|s| s.variants.len()).sum()
    }

    /// Returns true if nothing has been built yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the serving metrics recorder.
    pub fn metrics(&self) -> &ServeMetrics {
        &self.metrics
    }

    /// Returns current serving statistics.
    pub fn stats(&self) -> ServeStats {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(body: &str) -> CacheEntry {
        CacheEntry::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ContentHash::compute(body.as_bytes()),
            Bytes::from(body.to_string()),
            None,
        )
    }

    #[test]
    fn test_store_and_get() {
        let cache = AssetCache::new();
        let variant = Variant::new("^").unwrap();
        cache.store("app", &variant, entry("a"));

        let got = cache.get("app", "^").unwrap();
        assert_eq!(got.identity().as_ref(), b"a");
        assert!(got.encoding(Encoding::Gzip).is_none());
        assert!(cache.get("app", "MSIE").is_none());
        assert!(cache.get("other", "^").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_replace_keeps_position() {
        let cache = AssetCache::new();
        let ie = Variant::new("MSIE").unwrap();
        let any = Variant::new("^").unwrap();
        cache.store("app", &ie, entry("ie-1"));
        cache.store("app", &any, entry("any"));
        cache.store("app", &ie, entry("ie-2"));

        assert_eq!(cache.variant_keys("app"), vec!["MSIE", "^"]);
        assert_eq!(cache.get("app", "MSIE").unwrap().identity().as_ref(), b"ie-2");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_negotiate_first_match_in_insertion_order() {
        let cache = AssetCache::new();
        cache.store("app", &Variant::new("Firefox").unwrap(), entry("ff"));
        cache.store("app", &Variant::new("MSIE").unwrap(), entry("ie"));

        let (key, got) = cache.negotiate("app", "Mozilla/4.0 (compatible; msie 7.0)").unwrap();
        assert_eq!(key, "MSIE");
        assert_eq!(got.identity().as_ref(), b"ie");
        assert!(cache.negotiate("app", "curl/8.0").is_none());
        assert!(cache.negotiate("missing", "MSIE").is_none());
    }

    #[test]
    fn test_stamp_tracks_latest_build() {
        let cache = AssetCache::new();
        assert!(cache.stamp("app").is_none());

        cache.store("app", &Variant::new("^").unwrap(), entry("one"));
        cache.store("app", &Variant::new("MSIE").unwrap(), entry("two"));

        let stamp = cache.stamp("app").unwrap();
        assert_eq!(stamp.content_hash, ContentHash::compute(b"two"));
    }

    #[test]
    fn test_manifest() {
        let cache = AssetCache::new();
        cache.store("b", &Variant::new("^").unwrap(), entry("bb"));
        cache.store("a", &Variant::new("^").unwrap(), entry("a"));

        let manifest = cache.manifest();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].group, "a");
        assert_eq!(manifest[1].variants[0].bytes, 2);
        assert_eq!(manifest[1].variants[0].encodings, vec![Encoding::Identity]);
        assert_eq!(manifest[0].content_hash, ContentHash::compute(b"a"));
    }

    #[test]
    fn test_serve_stats() {
        let cache = AssetCache::new();
        cache.metrics().record_served(Encoding::Gzip);
        cache.metrics().record_served(Encoding::Identity);
        cache.metrics().record_not_modified();
        cache.metrics().record_pass_through();

        let stats = cache.stats();
        assert_eq!(stats.served, 2);
        assert_eq!(stats.compressed, 1);
        assert_eq!(stats.not_modified, 1);
        assert_eq!(stats.passed_through, 1);
    }
}
