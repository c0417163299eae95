//! # Satchel Node
//!
//! An HTTP server for named asset groups. Each group bundles script,
//! stylesheet or markup files into one minified, gzip-encoded artifact per
//! user-agent variant, served with long-lived cache headers and rebuilt
//! whenever one of its files changes.
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --bin satchel-node -- --config satchel.yaml
//! ```
//!
//! See [`config`] for the configuration format.

pub mod config;
mod error;
pub mod node;
pub mod observability;
pub mod transforms;

pub use config::{ConfigError, NodeConfig};
pub use node::Node;
