//! ovimd — the OVIM hub daemon.
//!
//! Single binary that assembles the spoke coordination subsystem:
//! - Spoke registry (in-memory agent, queue, result and metadata maps)
//! - Delivery worker pool, dispatcher and result processor
//! - Replication reconciler over the VDC store
//! - REST API (spoke endpoints + deletion-complete)
//!
//! # Usage
//!
//! ```text
//! ovimd hub --port 8080 --config /etc/ovim/hub.toml
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};

use ovim_api::SpokeAuth;
use ovim_reconcile::{InMemoryVdcStore, Reconciler};
use ovim_spoke::SpokeHub;
use ovim_state::SpokeRegistry;

use crate::config::HubConfig;

#[derive(Parser)]
#[command(name = "ovimd", about = "OVIM hub daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hub: spoke API, delivery workers and replication reconciler.
    Hub {
        /// TOML configuration file.
        #[arg(long, env = "OVIM_CONFIG")]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long, env = "OVIM_PORT")]
        port: Option<u16>,

        /// Base URL for completion callbacks (overrides the config file).
        #[arg(long, env = "OVIM_LOCAL_BASE_URL")]
        local_base_url: Option<String>,

        /// Shared bearer token for spoke agents.
        #[arg(long, env = "OVIM_SPOKE_TOKEN", hide_env_values = true)]
        spoke_token: Option<String>,

        /// Reconciler interval in seconds.
        #[arg(long)]
        reconcile_interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Hub {
            config,
            port,
            local_base_url,
            spoke_token,
            reconcile_interval,
        } => {
            let mut hub_config = match config {
                Some(path) => {
                    let loaded = HubConfig::from_file(&path)?;
                    info!(path = ?path, "configuration loaded");
                    loaded
                }
                None => HubConfig::default(),
            };
            if let Some(port) = port {
                hub_config.listen_port = port;
            }
            if let Some(url) = local_base_url {
                hub_config.local_base_url = Some(url);
            }
            if let Some(token) = spoke_token {
                hub_config.spoke_token = token;
            }
            if let Some(secs) = reconcile_interval {
                anyhow::ensure!(secs > 0, "--reconcile-interval must be at least 1");
                hub_config.reconcile_interval_secs = secs;
            }
            run_hub(hub_config).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ovimd=debug,ovim=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_hub(config: HubConfig) -> anyhow::Result<()> {
    info!("OVIM hub starting");

    // ── Initialize subsystems ──────────────────────────────────

    let registry =
        SpokeRegistry::new().with_stale_after(Duration::from_secs(config.stale_after_secs));
    let hub = SpokeHub::start(registry, config.spoke())?;

    let vdc_store = InMemoryVdcStore::new();
    for vdc in config.seed_vdcs.iter().cloned() {
        vdc_store.insert(vdc).await;
    }
    info!(seeded = config.seed_vdcs.len(), "vdc store initialized");

    let reconciler = Reconciler::new(hub.clone(), vdc_store.clone(), config.reconciler());

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let reconcile_handle = tokio::spawn(async move {
        reconciler.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = ovim_api::build_router(
        hub.clone(),
        vdc_store,
        SpokeAuth::new(config.spoke_token.as_str()),
    );
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c; shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the reconciler, then let in-flight deliveries finish.
    let _ = reconcile_handle.await;
    hub.shutdown().await;

    info!("OVIM hub stopped");
    Ok(())
}
