//! Resource proxy service.
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                RESOURCE PROXY                │
//!   GET /gw/proxy_view    │  ┌──────┐   ┌──────────┐   ┌─────────────┐   │
//!   ?url=<target>  ───────┼─▶│ auth │──▶│ validate │──▶│ HEAD / GET  │───┼──▶ Upstream
//!                         │  └──────┘   └──────────┘   └──────┬──────┘   │
//!                         │                                   │          │
//!   streamed body  ◀──────┼───────────── size-limited relay ◀─┘          │
//!                         │                                              │
//!                         │  config (hot reload) · logging · metrics     │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use resource_proxy::config::{read_config, validation::validate_config, AppConfig, ConfigWatcher};
use resource_proxy::lifecycle::{signals, Shutdown};
use resource_proxy::observability::{logging, metrics};
use resource_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "resource-proxy")]
#[command(about = "Authenticated streaming resource proxy", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload the configuration file when it changes.
    #[arg(long)]
    watch: bool,

    /// Accept unauthenticated callers. Development only.
    #[arg(long)]
    allow_anonymous: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if args.allow_anonymous {
        config.auth.allow_anonymous = true;
    }

    logging::init_logging(&config.observability.log_level);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!("resource-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_secs = config.proxy.timeout_secs,
        chunk_size = config.proxy.chunk_size,
        max_file_size = config.proxy.max_file_size,
        download_proxy = ?config.proxy.download_proxy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // Hot reload: file watcher and SIGHUP both publish on the same channel.
    let (reloader, config_updates, _watch_guard) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let guard = if args.watch { Some(watcher.run()?) } else { None };
            (Some(watcher), updates, guard)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates, None)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::handle_signals(shutdown.clone(), reloader));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
