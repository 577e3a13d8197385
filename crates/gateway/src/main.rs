//! The `orion` binary: load config, wire the host, serve the loopback
//! API, and run the background loops.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use orion_domain::config::Config;
use orion_gateway::runtime::heartbeat::HeartbeatLoop;
use orion_gateway::state::HostContext;
use orion_store::JsonFileStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Parser)]
#[command(name = "orion", about = "Orion personal-assistant host")]
struct Cli {
    /// Path to config.toml.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,

    /// Data directory for the JSON file store.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// main
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ORION_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Engine adapters and channel adapters are deployment plugins;
    // the host boots without them and reports the gaps via /health.
    let store = Arc::new(JsonFileStore::new(&cli.data_dir));
    let ctx = HostContext::build(config, Vec::new(), Vec::new(), store)
        .await
        .context("host wiring failed")?;

    ctx.channels.start_all().await;

    // ── Background loops ───────────────────────────────────────────
    tokio::spawn(ctx.usage.clone().run_flush_loop());
    tokio::spawn(HeartbeatLoop::new(ctx.clone()).run());
    {
        let sessions = ctx.channels.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                let evicted = sessions.evict_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted idle sessions");
                }
            }
        });
    }

    // ── Serve ──────────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("invalid server host/port")?;
    // A bind conflict is one of the two conditions the host refuses
    // to survive.
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!(%addr, "orion listening");

    let router = orion_gateway::api::build_router(ctx.clone());
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    // ── Drain ──────────────────────────────────────────────────────
    tracing::info!("shutting down: stopping channels and flushing usage");
    ctx.channels.stop_all().await;
    ctx.usage.flush().await;
    Ok(())
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("cannot parse {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
}
