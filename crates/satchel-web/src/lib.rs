//! HTTP serving for Satchel.
//!
//! This crate turns the [`satchel_core::AssetCache`] into HTTP responses:
//!
//! - route and user-agent negotiation with pass-through on a miss
//! - gzip selection from `Accept-Encoding`
//! - conditional GET via `If-Modified-Since`
//! - long-lived cache headers, overridable per group

pub mod headers;
mod manifest;
mod serve;

pub use headers::CacheControl;
pub use manifest::{manifest, Manifest};
pub use serve::{serve_assets, with_assets, AssetService, ServeModify, ServedAsset};
