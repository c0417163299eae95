//! JSON introspection of the cache: per-group build stamps and variants.

use crate::serve::AssetService;
use axum::extract::State;
use axum::Json;
use satchel_core::{ManifestEntry, ServeStats};
use serde::Serialize;
use std::sync::Arc;

/// Body of the manifest route.
#[derive(Debug, Serialize)]
pub struct Manifest {
    /// Every built group, sorted by name.
    pub groups: Vec<ManifestEntry>,
    /// Serving counters.
    pub stats: ServeStats,
}

/// Returns the current [`Manifest`].
pub async fn manifest(State(service): State<Arc<AssetService>>) -> Json<Manifest> {
    Json(Manifest {
        groups: service.cache().manifest(),
        stats: service.cache().stats(),
    })
}
