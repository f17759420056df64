//! syncbeats — terminal client for a shared watch room.
//!
//! Joins (or creates) a room, follows the host's playback with a headless
//! player, and reads commands from stdin.

mod commands;
mod events;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use syncbeats_core::domain::identity::{generate_username, RoomId, UserId};
use syncbeats_core::SyncConfig;

use crate::commands::{Command, HELP};
use crate::events::TerminalAppEvents;
use crate::state::{build_room_connection, RoomTarget};

#[derive(Parser, Debug)]
#[command(name = "syncbeats")]
#[command(about = "Watch videos in sync with a room")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay WebSocket URL (overrides the config file)
    #[arg(long)]
    relay_url: Option<String>,

    /// Room service base URL (overrides the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Room to join
    #[arg(short, long, required_unless_present = "create", conflicts_with = "create")]
    room: Option<String>,

    /// Create a new room and join it
    #[arg(long)]
    create: bool,

    /// Display name; a random one is picked when omitted
    #[arg(short, long)]
    username: Option<String>,

    /// Length in seconds given to every video the headless player loads
    #[arg(long)]
    video_length: Option<f64>,
}

fn load_config(args: &Args) -> anyhow::Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    if let Some(url) = &args.relay_url {
        config = config.with_relay_url(url.clone());
    }
    if let Some(url) = &args.api_url {
        config = config.with_api_base_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let target = match &args.room {
        Some(room) => RoomTarget::Join(RoomId::new(room.trim())),
        None => RoomTarget::Create,
    };
    let username = args
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(generate_username, UserId::new);

    let mut conn = build_room_connection(
        &config,
        target,
        username,
        args.video_length,
        Arc::new(TerminalAppEvents::new()),
    )
    .await
    .context("could not enter the room")?;

    println!("joined room {} as {}", conn.room_id, conn.username);
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    conn.handle.leave();
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => match commands::execute(command, &conn).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("! {e:#}"),
                    },
                    Err(e) => println!("! {e:#}\n{HELP}"),
                }
            }

            ended = &mut conn.session => {
                match ended {
                    Ok(Ok(reason)) => info!(?reason, "Session ended"),
                    Ok(Err(e)) => warn!("Session failed: {e}"),
                    Err(e) => warn!("Session task panicked: {e}"),
                }
                conn.channel.disconnect().await;
                return Ok(());
            }

            _ = tokio::signal::ctrl_c() => {
                conn.handle.leave();
                break;
            }
        }
    }

    if let Ok(Ok(reason)) = (&mut conn.session).await {
        info!(?reason, "Session ended");
    }
    conn.channel.disconnect().await;
    Ok(())
}
