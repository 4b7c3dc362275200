//! cnetd — the cnet networking daemon.
//!
//! Assembles the in-memory daemon backend and serves the REST API on a TCP
//! address or a Unix socket.
//!
//! # Usage
//!
//! ```text
//! cnetd --config /etc/cnet/cnetd.toml --listen unix:///var/run/cnet/cnet.sock
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cnet_api::PolicyView;
use cnet_daemon::{Daemon, MemoryDaemon};

use crate::config::{DaemonConfig, Listen, LogFormat, LogSettings};

#[derive(Parser)]
#[command(name = "cnetd", about = "cnet networking daemon")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (`tcp://host:port` or `unix:///path`).
    #[arg(long)]
    listen: Option<Listen>,

    /// Render `GET /policy` as the whole subtree or the node alone.
    #[arg(long)]
    policy_view: Option<PolicyView>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.api.listen = listen;
    }
    if let Some(view) = cli.policy_view {
        config.api.policy_view = view;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }

    init_tracing(&config.log)?;
    run(config).await
}

fn init_tracing(log: &LogSettings) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log.filter))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("cnet daemon starting");

    let daemon: Arc<dyn Daemon> = Arc::new(MemoryDaemon::new(config.memory())?);
    info!(
        node_prefix = %config.ipam.node_prefix,
        first_identity = config.labels.first_identity,
        "daemon backend initialized"
    );

    let router = cnet_api::build_router(daemon, config.gateway());

    match &config.api.listen {
        Listen::Tcp(addr) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, policy_view = %config.api.policy_view, "API server starting");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Listen::Unix(path) => {
            remove_stale_socket(path)?;
            let listener = tokio::net::UnixListener::bind(path)?;
            info!(path = %path.display(), policy_view = %config.api.policy_view, "API server starting");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to remove socket");
            }
        }
    }

    info!("cnet daemon stopped");
    Ok(())
}

/// Clear a socket left behind by a previous run. Refuses to touch anything
/// that is not a socket.
fn remove_stale_socket(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::FileTypeExt;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            info!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Ok(_) => bail!("{} exists and is not a socket", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
