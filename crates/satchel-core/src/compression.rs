//! Gzip encoding for cached artifacts.
//!
//! Provides configurable compression levels and statistics
//! for monitoring how much the compressed encodings save.

use flate2::write::GzEncoder;
use serde::Deserialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Store only the identity encoding.
    None,
    /// Fast compression (lower ratio)
    Fast,
    /// Default compression (balanced)
    Default,
    /// Best compression (slower, higher ratio)
    Best,
}

impl CompressionLevel {
    /// Converts to flate2 compression level.
    ///
    /// Returns `None` when compression is disabled.
    pub fn to_flate2(self) -> Option<flate2::Compression> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Fast => Some(flate2::Compression::fast()),
            CompressionLevel::Default => Some(flate2::Compression::default()),
            CompressionLevel::Best => Some(flate2::Compression::best()),
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Best
    }
}

/// Gzip-encodes `data` at the given level.
pub fn gzip(data: &[u8], level: flate2::Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 64), level);
    encoder.write_all(data)?;
    encoder.finish()
}

/// Compression statistics for monitoring.
#[derive(Debug, Default)]
pub struct CompressionStats {
    /// Total bytes before compression.
    pub input_bytes: AtomicU64,
    /// Total bytes after compression.
    pub output_bytes: AtomicU64,
    /// Number of compression operations.
    pub compress_count: AtomicU64,
    /// Number of failed compression operations.
    pub failure_count: AtomicU64,
}

impl CompressionStats {
    /// Creates new compression stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a compression operation.
    pub fn record_compress(&self, input_size: u64, output_size: u64) {
        self.input_bytes.fetch_add(input_size, Ordering::Relaxed);
        self.output_bytes.fetch_add(output_size, Ordering::Relaxed);
        self.compress_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed compression operation.
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the compression ratio (output/input).
    pub fn compression_ratio(&self) -> f64 {
        self.snapshot().compression_ratio()
    }

    /// Returns a snapshot of the stats.
    pub fn snapshot(&self) -> CompressionStatsSnapshot {
        CompressionStatsSnapshot {
            input_bytes: self.input_bytes.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            compress_count: self.compress_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of compression statistics.
#[derive(Debug, Clone)]
pub struct CompressionStatsSnapshot {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub compress_count: u64,
    pub failure_count: u64,
}

impl CompressionStatsSnapshot {
    /// Returns the compression ratio.
    pub fn compression_ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            1.0
        } else {
            self.output_bytes as f64 / self.input_bytes as f64
        }
    }
}
