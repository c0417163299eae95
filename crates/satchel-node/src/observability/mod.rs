//! # Observability Module
//!
//! Structured logging for the Satchel node. HTTP requests are traced by
//! `tower_http::trace::TraceLayer` in [`crate::node`].
//!
//! ```rust,ignore
//! use satchel_node::observability::{init_logging, LogFormat};
//!
//! init_logging("info", LogFormat::Json);
//! ```

mod logging;

pub use logging::{init_logging, LogFormat};
