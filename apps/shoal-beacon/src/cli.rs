use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::discovery::{discover, DiscoveryOutcome};

#[derive(Debug, Parser)]
#[command(name = "shoal-beacon")]
#[command(about = "Shoal stream discovery endpoint and viewer client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Address to bind the listener to.
    #[arg(
        long,
        env = "SHOAL_BEACON_LISTEN_ADDR",
        default_value = "127.0.0.1:8081"
    )]
    pub listen_addr: String,

    /// Identity reported to clients in handshake responses.
    #[arg(long, env = "SHOAL_BEACON_NODE_ID", default_value = "shoal-beacon")]
    pub node_id: String,

    /// Maximum time a connection has to complete its handshake.
    #[arg(
        long,
        env = "SHOAL_BEACON_HANDSHAKE_TIMEOUT_SECS",
        default_value_t = 10
    )]
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a viewer discovery session against a beacon and print its catalog
    Discover {
        /// Beacon base URL (e.g., ws://localhost:8081)
        #[arg(short, long, default_value = "ws://127.0.0.1:8081")]
        url: String,

        /// Role announced in the handshake
        #[arg(long, default_value = "viewer")]
        node_type: String,

        /// Per-step deadline in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub node_id: String,
    pub handshake_timeout: Duration,
}

impl TryFrom<&Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        Ok(ServerConfig {
            listen_addr,
            node_id: cli.node_id.clone(),
            handshake_timeout: Duration::from_secs(cli.handshake_timeout_secs),
        })
    }
}

/// Run the discovery session and print the result. Exit-code policy lives in
/// `main`: an `Err` here becomes a non-zero exit, a declined handshake does
/// not.
pub async fn run_discover_client(url: &str, node_type: &str, timeout_secs: u64) -> Result<()> {
    println!("🔍 Connecting to {url}...");
    let outcome = discover(url, node_type, Duration::from_secs(timeout_secs)).await?;

    match outcome {
        DiscoveryOutcome::Streams(streams) => {
            println!("✅ Found {} streams", streams.len());
            for stream in &streams {
                match (
                    stream.get("title").and_then(Value::as_str),
                    stream.get("stream_id").and_then(Value::as_str),
                ) {
                    (Some(title), Some(stream_id)) => println!("  {title} ({stream_id})"),
                    _ => println!("  {stream}"),
                }
            }
        }
        DiscoveryOutcome::Declined { response } => {
            println!(
                "⚠️  Handshake not acknowledged (got \"{}\"); stream list not requested",
                response.kind
            );
        }
    }

    Ok(())
}
