//! Node configuration.
//!
//! The whole node is described by one YAML file:
//!
//! ```yaml
//! listen: 127.0.0.1:8080
//! compression: best
//! manifest_path: /assets/manifest.json
//! groups:
//!   - name: app-js
//!     path: ./public/js
//!     route: ^/app\.js$
//!     data_type: javascript
//!     files: [jquery.js, "*", { pattern: "^widget-.*\\.js$" }]
//!     post_manipulate:
//!       - user_agent: msie
//!         transforms:
//!           - type: banner
//!             text: "/* legacy build */"
//! ```

pub use crate::error::{ConfigError, Result};
use crate::observability::LogFormat;
use crate::transforms::{Banner, Replace, StripSourceMaps};
use satchel_core::{
    CompressionLevel, DataType, FetchConfig, GroupSpec, Pipeline, WatchConfig, DEFAULT_VARIANT,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the Satchel node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// HTTP listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
    /// Member fetching.
    #[serde(default)]
    pub fetch: FetchSettings,
    /// gzip level for cached artifacts.
    #[serde(default)]
    pub compression: CompressionLevel,
    /// File watching.
    #[serde(default)]
    pub watch: WatchSettings,
    /// Route serving the cache manifest as JSON, if any.
    #[serde(default)]
    pub manifest_path: Option<String>,
    /// Asset groups, in route-matching order.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Member fetching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// Delay before each local read, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Remote request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent for remote requests.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_throttle_ms() -> u64 {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

impl FetchSettings {
    /// Converts to the fetcher configuration.
    pub fn to_fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            throttle: Duration::from_millis(self.throttle_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

/// File watching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl WatchSettings {
    /// Converts to the watcher configuration.
    pub fn to_watch_config(&self) -> WatchConfig {
        WatchConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// One asset group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// Directory holding the local members.
    pub path: PathBuf,
    /// Regular expression matched against the request path.
    pub route: String,
    pub data_type: DataType,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Serve the raw concatenation.
    #[serde(default)]
    pub debug: bool,
    /// Never rebuild on file changes.
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub pre_manipulate: Vec<ManipulateConfig>,
    #[serde(default)]
    pub post_manipulate: Vec<ManipulateConfig>,
    /// Overrides how far in the future `Expires` lies.
    #[serde(default)]
    pub expires_secs: Option<u64>,
}

/// A file list entry: a name, `*`, a URL, or a regular expression.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FileEntry {
    Name(String),
    Pattern { pattern: String },
}

/// Transforms applied for user agents matching `user_agent`.
#[derive(Debug, Clone, Deserialize)]
pub struct ManipulateConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

fn default_user_agent() -> String {
    DEFAULT_VARIANT.to_string()
}

/// A built-in transform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Regex replace-all.
    Replace { pattern: String, with: String },
    /// Prepend a line.
    Banner { text: String },
    /// Drop `sourceMappingURL` comments.
    StripSourceMaps,
}

impl NodeConfig {
    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&yaml)
    }

    /// Parses YAML configuration.
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validates every group and converts them to specs, in order.
    pub fn group_specs(&self) -> Result<Vec<GroupSpec>> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(satchel_core::CacheError::DuplicateGroup(group.name.clone()).into());
            }
        }
        self.groups.iter().map(GroupConfig::to_spec).collect()
    }
}

impl GroupConfig {
    /// Converts the record to a [`GroupSpec`].
    pub fn to_spec(&self) -> Result<GroupSpec> {
        let group_err = |source| ConfigError::Group {
            group: self.name.clone(),
            source,
        };

        let mut spec = GroupSpec::new(&self.name, &self.path, &self.route, self.data_type)
            .map_err(group_err)?
            .debug(self.debug)
            .stale(self.stale);

        for entry in &self.files {
            spec = match entry {
                FileEntry::Name(name) => spec.with_files([name]),
                FileEntry::Pattern { pattern } => spec.with_pattern(pattern).map_err(group_err)?,
            };
        }

        for manipulate in &self.pre_manipulate {
            let pipeline = self.pipeline(&manipulate.transforms)?;
            spec = spec
                .pre_manipulate(&manipulate.user_agent, pipeline)
                .map_err(group_err)?;
        }
        for manipulate in &self.post_manipulate {
            let pipeline = self.pipeline(&manipulate.transforms)?;
            spec = spec
                .post_manipulate(&manipulate.user_agent, pipeline)
                .map_err(group_err)?;
        }

        Ok(spec)
    }

    /// `Expires` override, if configured.
    pub fn expires(&self) -> Option<Duration> {
        self.expires_secs.map(Duration::from_secs)
    }

    fn pipeline(&self, transforms: &[TransformConfig]) -> Result<Pipeline> {
        transforms.iter().try_fold(Pipeline::new(), |pipeline, transform| {
            Ok(match transform {
                TransformConfig::Replace { pattern, with } => {
                    let replace =
                        Replace::new(pattern, with.clone()).map_err(|e| ConfigError::Transform {
                            group: self.name.clone(),
                            message: e.to_string(),
                        })?;
                    pipeline.then(replace)
                }
                TransformConfig::Banner { text } => pipeline.then(Banner::new(text.clone())),
                TransformConfig::StripSourceMaps => pipeline.then(StripSourceMaps),
            })
        })
    }
}
