//! Process wiring: resolve, build, watch, serve.

use crate::config::{NodeConfig, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use satchel_core::{
    spawn_watcher, AssetCache, BuildOutcome, Builder, DefaultFetcher, GroupSet, WatcherHandle,
};
use satchel_web::{manifest, with_assets, AssetService};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// A running asset node.
pub struct Node {
    builder: Arc<Builder>,
    service: Arc<AssetService>,
    manifest_path: Option<String>,
    watcher: Option<WatcherHandle>,
}

impl Node {
    /// Resolves every group, builds the cache and starts the file watcher.
    ///
    /// # Errors
    ///
    /// Invalid group records and unlistable group directories are fatal.
    /// Members that cannot be fetched are not.
    pub async fn start(config: &NodeConfig) -> Result<Self> {
        let specs = config.group_specs()?;
        let groups = Arc::new(GroupSet::resolve(specs).await?);
        let cache = Arc::new(AssetCache::new());
        let fetcher = DefaultFetcher::new(config.fetch.to_fetch_config())?;

        let builder = Arc::new(
            Builder::new(groups.clone(), cache.clone(), Arc::new(fetcher))
                .with_compression(config.compression),
        );

        let reports = builder.build(None).await?;
        let stored = reports
            .iter()
            .filter(|r| matches!(r.outcome, BuildOutcome::Stored { .. }))
            .count();
        for report in reports.iter().filter(|r| r.outcome == BuildOutcome::Skipped) {
            tracing::warn!(
                group = %report.group,
                variant = %report.variant,
                "Group has no content yet, requests will pass through"
            );
        }
        tracing::info!(groups = groups.len(), stored, "Initial build complete");

        let watcher = if config.watch.enabled {
            match spawn_watcher(builder.clone(), config.watch.to_watch_config()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "File watcher unavailable, groups will not rebuild");
                    None
                }
            }
        } else {
            tracing::info!("File watching disabled");
            None
        };

        let service = config.groups.iter().fold(
            AssetService::new(cache, groups),
            |service, group| match group.expires() {
                Some(expires) => service.with_expires(&group.name, expires),
                None => service,
            },
        );

        Ok(Self {
            builder,
            service: Arc::new(service),
            manifest_path: config.manifest_path.clone(),
            watcher,
        })
    }

    /// Returns the builder, e.g. to trigger a rebuild.
    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }

    /// Returns the serving side.
    pub fn service(&self) -> &Arc<AssetService> {
        &self.service
    }

    /// Returns true if file changes trigger rebuilds.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Builds the HTTP router. Requests that no group answers get a 404.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        if let Some(path) = &self.manifest_path {
            router = router.route(path, get(manifest));
        }
        let router = router
            .fallback(not_found)
            .with_state(self.service.clone());

        with_assets(router, self.service.clone()).layer(TraceLayer::new_for_http())
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
