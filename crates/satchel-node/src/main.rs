//! Satchel Node - serves configured asset groups over HTTP.

use anyhow::Context;
use clap::Parser;
use satchel_node::observability::{init_logging, LogFormat};
use satchel_node::{Node, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Satchel Node - bundled, minified and cached static assets
#[derive(Parser, Debug)]
#[command(name = "satchel-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "satchel.yaml")]
    config: PathBuf,

    /// HTTP listen address (overrides the config file)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,

    /// Do not rebuild groups when their files change
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(format) = args.log_format.as_deref() {
        config.log.format = LogFormat::parse(format);
    }
    if args.no_watch {
        config.watch.enabled = false;
    }

    init_logging(&config.log.level, config.log.format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Satchel node");
    tracing::info!(
        listen = %config.listen,
        groups = config.groups.len(),
        watch = config.watch.enabled,
        "Node configuration"
    );

    let node = Node::start(&config).await.context("starting node")?;

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(addr = %config.listen, "Node is ready. Press Ctrl+C to stop.");

    axum::serve(listener, node.router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!(stats = ?node.service().cache().stats(), "Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
