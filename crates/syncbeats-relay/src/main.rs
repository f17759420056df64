//! Standalone room relay binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use syncbeats_relay::rooms::RoomRegistry;

#[derive(Parser, Debug)]
#[command(name = "syncbeats-relay", about = "Room server for syncbeats clients")]
struct Args {
    /// Address for the REST API and the `/ws` endpoint.
    #[arg(long, default_value = "0.0.0.0:5000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    syncbeats_relay::serve(listener, Arc::new(RoomRegistry::new())).await
}
