use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing::info;

use shoal_beacon::cli::{self, Cli, Commands, ServerConfig};
use shoal_beacon::handlers;
use shoal_beacon::telemetry::Telemetry;
use shoal_beacon::websocket::BeaconState;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = Telemetry::init()?;
    let args = Cli::parse();

    if let Some(Commands::Discover {
        url,
        node_type,
        timeout_secs,
    }) = args.command
    {
        if let Err(err) = cli::run_discover_client(&url, &node_type, timeout_secs).await {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
        return Ok(());
    }

    let config = ServerConfig::try_from(&args)?;
    info!(
        listen_addr = %config.listen_addr,
        node_id = %config.node_id,
        "starting shoal beacon"
    );
    run(config, telemetry.metrics_handle()).await
}

async fn run(config: ServerConfig, metrics: PrometheusHandle) -> Result<()> {
    let state = BeaconState::new(config.node_id.clone(), config.handshake_timeout);
    let app = handlers::router_with_metrics(state, metrics);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listener")?;

    info!("shoal beacon listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown with error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
