//! Retrieval of group members from disk or over HTTP.

use crate::error::Result;
use crate::group::Source;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

/// Content and metadata of one fetched member. Lives for one build.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Raw content.
    pub content: String,
    /// Path on disk, or the URL for remote members.
    pub file_path: String,
    /// Modification time.
    pub modified: DateTime<Utc>,
    /// Whether the member came from a remote URL.
    pub external: bool,
}

/// Fetches one member of a group.
///
/// Failures are soft: implementations log and return `None` so the rest
/// of the group still builds.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches `source`, resolving local names against `base`.
    async fn fetch(&self, source: &Source, base: &Path) -> Option<FileInfo>;
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Delay applied before every local read.
    pub throttle: Duration,
    /// Timeout for remote requests.
    pub timeout: Duration,
    /// User agent sent with remote requests.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            user_agent: concat!("satchel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Reads local members with `tokio::fs` and remote members with `reqwest`.
pub struct DefaultFetcher {
    client: Client,
    config: FetchConfig,
}

impl DefaultFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_local(&self, name: &str, base: &Path) -> Option<FileInfo> {
        let path = base.join(name);
        if !self.config.throttle.is_zero() {
            tokio::time::sleep(self.config.throttle).await;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Could not read group member");
                return None;
            }
        };

        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "No modification time, using now");
                Utc::now()
            }
        };

        Some(FileInfo {
            content: String::from_utf8_lossy(&bytes).into_owned(),
            file_path: path.display().to_string(),
            modified,
            external: false,
        })
    }

    async fn fetch_remote(&self, url: &str) -> Option<FileInfo> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "Remote member request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(url, status = %response.status(), "Remote member returned an error status");
            return None;
        }

        let modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .unwrap_or_else(Utc::now);

        let content = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, error = %e, "Could not read remote member body");
                return None;
            }
        };

        Some(FileInfo {
            content,
            file_path: url.to_string(),
            modified,
            external: true,
        })
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, source: &Source, base: &Path) -> Option<FileInfo> {
        match source {
            Source::Local(name) => self.fetch_local(name, base).await,
            Source::Remote(url) => self.fetch_remote(url).await,
        }
    }
}

/// Obsolete HTTP date layouts recipients must still accept: RFC 850 and asctime.
const OBSOLETE_HTTP_DATE_FORMATS: &[&str] = &["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parses an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
///
/// The RFC 850 and asctime forms are accepted as well.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    OBSOLETE_HTTP_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp as an HTTP date.
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
