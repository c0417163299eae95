//! Rebuilds groups when their local members change on disk.
//!
//! The `notify` callback only forwards changed paths into a bounded queue.
//! A single worker drains the queue, waits for the burst to go quiet,
//! maps paths back to group names and rebuilds each affected group once.

use crate::builder::Builder;
use crate::error::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period before a burst of changes is rebuilt.
    pub debounce: Duration,
    /// Capacity of the change queue.
    pub queue_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            queue_capacity: 64,
        }
    }
}

/// Keeps the file watcher and its rebuild worker alive.
///
/// Dropping the handle stops watching; the worker exits once the queue
/// drains.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
    tracked: usize,
}

impl WatcherHandle {
    /// Number of member files being watched.
    pub fn tracked_files(&self) -> usize {
        self.tracked
    }

    /// Stops watching and aborts any rebuild in progress.
    pub fn stop(self) {
        self.worker.abort();
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("tracked", &self.tracked)
            .finish_non_exhaustive()
    }
}

/// Maps member files to the groups that contain them.
#[derive(Debug, Default, Clone)]
pub struct TrackedFiles {
    files: HashMap<PathBuf, Vec<String>>,
}

impl TrackedFiles {
    /// Collects the local members of every group that is not stale.
    pub fn from_builder(builder: &Builder) -> Self {
        let mut tracked = Self::default();
        for group in builder.groups().iter().filter(|g| !g.is_stale()) {
            for path in group.local_paths() {
                tracked.insert(&path, group.name());
            }
        }
        tracked
    }

    /// Tracks `path` as a member of `group`.
    pub fn insert(&mut self, path: &Path, group: &str) {
        let groups = self.files.entry(normalize(path)).or_default();
        if !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
    }

    /// Groups containing `path`, if it is tracked.
    pub fn groups_for(&self, path: &Path) -> &[String] {
        self.files
            .get(&normalize(path))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distinct directories holding tracked files.
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.files
            .keys()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect()
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Canonicalizes the parent directory so event paths and configured paths
/// compare equal even through symlinks or relative group paths.
fn normalize(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => {
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            std::fs::canonicalize(dir)
                .map(|dir| dir.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Starts watching every local member of every non-stale group.
///
/// Must be called from within a Tokio runtime. A directory that cannot
/// be watched is logged and skipped.
///
/// # Errors
///
/// Returns an error if the platform watcher cannot be created.
pub fn spawn_watcher(builder: Arc<Builder>, config: WatchConfig) -> Result<WatcherHandle> {
    let tracked = TrackedFiles::from_builder(&builder);
    let (tx, rx) = mpsc::channel::<PathBuf>(config.queue_capacity.max(1));

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if tx.blocking_send(path).is_err() {
                    return;
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "File watch error"),
    })?;

    for dir in tracked.directories() {
        match watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => tracing::debug!(dir = %dir.display(), "Watching directory"),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Could not watch directory")
            }
        }
    }

    let count = tracked.len();
    tracing::info!(files = count, "File watcher started");

    let worker = tokio::spawn(run_rebuilds(rx, tracked, builder, config.debounce));
    Ok(WatcherHandle {
        _watcher: watcher,
        worker,
        tracked: count,
    })
}

/// Drains changed paths and rebuilds the affected groups.
///
/// Changes arriving within `debounce` of each other are coalesced so a
/// group is rebuilt at most once per burst. Returns when `rx` closes.
pub async fn run_rebuilds(
    mut rx: mpsc::Receiver<PathBuf>,
    tracked: TrackedFiles,
    builder: Arc<Builder>,
    debounce: Duration,
) {
    let mut pending = BTreeSet::new();

    while let Some(path) = rx.recv().await {
        pending.extend(tracked.groups_for(&path).iter().cloned());

        let mut closed = false;
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(path)) => pending.extend(tracked.groups_for(&path).iter().cloned()),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        for group in std::mem::take(&mut pending) {
            tracing::info!(group = %group, "Group member changed, rebuilding");
            if let Err(e) = builder.build(Some(&group)).await {
                tracing::warn!(group = %group, error = %e, "Rebuild failed");
            }
        }

        if closed {
            break;
        }
    }

    tracing::debug!("Rebuild worker stopped");
}
