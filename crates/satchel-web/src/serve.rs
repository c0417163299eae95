//! Content negotiation and serving of cached groups.
//!
//! [`serve_assets`] is an axum middleware: requests whose path matches a
//! group route and whose user agent selects a cached variant are answered
//! from the [`AssetCache`]; everything else is passed to the next handler.
//! Requests never wait for a build.

use crate::headers::{accepts_gzip, http_date, if_modified_since, CacheControl, DEFAULT_EXPIRES};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use satchel_core::{AssetCache, Encoding, GroupSet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The response computed for a cache hit, before headers are written.
#[derive(Debug, Clone)]
pub struct ServedAsset {
    /// Group being served.
    pub group: String,
    /// Variant key selected by the user agent.
    pub variant: String,
    /// Body in the selected encoding.
    pub body: Bytes,
    /// Content-Type of the group.
    pub content_type: HeaderValue,
    /// Encoding of `body`.
    pub encoding: Encoding,
    /// Sent as `Last-Modified` and compared against `If-Modified-Since`.
    pub last_modified: DateTime<Utc>,
    /// Sent as `Expires`.
    pub expires: DateTime<Utc>,
    /// Sent as `Cache-Control`.
    pub cache_control: CacheControl,
    /// Extra headers, written after (and overriding) the standard ones.
    pub headers: HeaderMap,
}

impl ServedAsset {
    fn into_response(self, not_modified: bool) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::LAST_MODIFIED, http_date(&self.last_modified));
        headers.insert(header::DATE, http_date(&Utc::now()));
        headers.insert(header::CACHE_CONTROL, self.cache_control.to_header_value());
        headers.insert(header::EXPIRES, http_date(&self.expires));
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));

        if !not_modified {
            headers.insert(header::CONTENT_TYPE, self.content_type);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
            if let Some(encoding) = self.encoding.header_value() {
                headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
            }
        }

        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        if not_modified {
            (StatusCode::NOT_MODIFIED, headers).into_response()
        } else {
            (StatusCode::OK, headers, Body::from(self.body)).into_response()
        }
    }
}

/// Per-group hook that may rewrite a response before it is sent.
///
/// The returned asset is what gets served, including for the
/// `If-Modified-Since` comparison.
#[async_trait]
pub trait ServeModify: Send + Sync {
    /// Rewrites `asset` for the request described by `request`.
    async fn modify(&self, request: &Parts, asset: ServedAsset) -> ServedAsset;
}

#[derive(Clone, Default)]
struct GroupOptions {
    expires: Option<Duration>,
    serve_modify: Option<Arc<dyn ServeModify>>,
}

/// Serves built groups out of the shared cache.
pub struct AssetService {
    cache: Arc<AssetCache>,
    groups: Arc<GroupSet>,
    options: HashMap<String, GroupOptions>,
}

impl AssetService {
    /// Creates a service over the cache the builder publishes to.
    pub fn new(cache: Arc<AssetCache>, groups: Arc<GroupSet>) -> Self {
        Self {
            cache,
            groups,
            options: HashMap::new(),
        }
    }

    /// Installs a response hook for `group`.
    pub fn with_serve_modify(mut self, group: impl Into<String>, hook: Arc<dyn ServeModify>) -> Self {
        self.options.entry(group.into()).or_default().serve_modify = Some(hook);
        self
    }

    /// Overrides how far in the future `Expires` lies for `group`.
    pub fn with_expires(mut self, group: impl Into<String>, expires: Duration) -> Self {
        self.options.entry(group.into()).or_default().expires = Some(expires);
        self
    }

    /// Returns the cache.
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Returns the groups.
    pub fn groups(&self) -> &Arc<GroupSet> {
        &self.groups
    }

    /// Answers the request from the cache, or returns `None` to pass it on.
    pub async fn respond(&self, request: &Parts) -> Option<Response> {
        let path = request.uri.path();
        let group = self.groups.match_route(path)?;

        let user_agent = request
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let Some((variant, entry)) = self.cache.negotiate(group.name(), user_agent) else {
            tracing::trace!(group = %group.name(), path, "No cached variant, passing through");
            self.cache.metrics().record_pass_through();
            return None;
        };

        let encoding = if entry.encoding(Encoding::Gzip).is_some() && accepts_gzip(&request.headers) {
            Encoding::Gzip
        } else {
            Encoding::Identity
        };
        let body = entry.encoding(encoding)?.clone();

        let options = self.options.get(group.name()).cloned().unwrap_or_default();
        let expires = TimeDelta::from_std(options.expires.unwrap_or(DEFAULT_EXPIRES))
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut asset = ServedAsset {
            group: group.name().to_string(),
            variant,
            body,
            content_type: HeaderValue::from_static(group.data_type().content_type()),
            encoding,
            last_modified: entry.last_modified,
            expires,
            cache_control: CacheControl::for_assets(),
            headers: HeaderMap::new(),
        };

        if let Some(hook) = &options.serve_modify {
            asset = hook.modify(request, asset).await;
        }

        let not_modified = if_modified_since(&request.headers)
            .is_some_and(|since| since >= asset.last_modified);

        if not_modified {
            self.cache.metrics().record_not_modified();
        } else {
            self.cache.metrics().record_served(asset.encoding);
        }

        tracing::debug!(
            group = %asset.group,
            variant = %asset.variant,
            encoding = ?asset.encoding,
            not_modified,
            "Serving asset"
        );

        Some(asset.into_response(not_modified))
    }
}

impl std::fmt::Debug for AssetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetService")
            .field("groups", &self.groups.len())
            .field("configured", &self.options.len())
            .finish_non_exhaustive()
    }
}

/// Axum middleware answering group routes from the cache.
pub async fn serve_assets(
    State(service): State<Arc<AssetService>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    match service.respond(&parts).await {
        Some(response) => response,
        None => next.run(Request::from_parts(parts, body)).await,
    }
}

/// Layers [`serve_assets`] over `router`.
///
/// Add routes and a fallback before calling this: the middleware only
/// wraps what the router already has.
pub fn with_assets(router: Router, service: Arc<AssetService>) -> Router {
    router.layer(middleware::from_fn_with_state(service, serve_assets))
}
