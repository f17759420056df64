//! Interactive command handlers — one line of stdin per command.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

use syncbeats_core::domain::identity::{UserId, VideoId};

use crate::events::format_time;
use crate::state::RoomConnection;

pub const HELP: &str = "\
commands:
  play | pause             control playback (host)
  seek <secs|m:ss>         jump to a position (host)
  next                     advance the queue (host)
  kick <user>              remove a user from the room (host)
  sync                     ask the relay for the room position
  add <link|id>            queue a video
  remove <id>              remove a queued video
  volume <0-100> | mute    local volume
  status                   show room and playback state
  leave                    leave the room and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Seek(f64),
    Next,
    Sync,
    Add(String),
    Remove(VideoId),
    Volume(u32),
    Mute,
    Kick(UserId),
    Status,
    Leave,
    Help,
}

/// Seconds as `90`, `90.5` or `1:30`.
fn parse_position(text: &str) -> anyhow::Result<f64> {
    let seconds = match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().context("bad minutes")?;
            let seconds: f64 = seconds.parse().context("bad seconds")?;
            minutes as f64 * 60.0 + seconds
        }
        None => text.parse().context("bad position")?,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("position must be a non-negative number");
    }
    Ok(seconds)
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| anyhow!("empty command"))?;
        let arg = parts.next();
        let need = |what: &str| arg.ok_or_else(|| anyhow!("{verb} needs {what}"));

        Ok(match verb.to_ascii_lowercase().as_str() {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "seek" => Self::Seek(parse_position(need("a position")?)?),
            "next" | "skip" => Self::Next,
            "sync" => Self::Sync,
            "add" => Self::Add(need("a link or video id")?.to_string()),
            "remove" | "rm" => Self::Remove(VideoId::new(need("a video id")?)),
            "volume" | "vol" => Self::Volume(need("a level")?.parse().context("bad volume")?),
            "mute" | "unmute" => Self::Mute,
            "kick" => Self::Kick(UserId::new(need("a username")?)),
            "status" | "st" => Self::Status,
            "leave" | "quit" | "exit" => Self::Leave,
            "help" | "?" => Self::Help,
            other => bail!("unknown command {other:?}; try `help`"),
        })
    }
}

/// Run one command. Returns `false` when the user asked to leave.
pub async fn execute(command: Command, conn: &RoomConnection) -> anyhow::Result<bool> {
    match command {
        Command::Play => conn.handle.play().await?,
        Command::Pause => conn.handle.pause().await?,
        Command::Seek(time) => conn.handle.seek(time).await?,
        Command::Next => conn.handle.next().await?,
        Command::Sync => conn.handle.request_sync().await?,
        Command::Kick(user) => conn.handle.kick(user).await?,
        Command::Volume(level) => conn.handle.set_volume(level).await?,
        Command::Mute => conn.handle.toggle_mute().await?,
        Command::Add(input) => {
            let video = conn.queue.add(&input).await?;
            println!("* queued {video}");
        }
        Command::Remove(video) => conn.queue.remove(&video).await?,
        Command::Status => {
            let status = conn.handle.status().await?;
            let playing = if status.playback.playing { "playing" } else { "paused" };
            let video = status
                .current_index
                .and_then(|i| status.queue.get(i))
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let host = status
                .host
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            println!(
                "room {} as {} ({:?}{})",
                status.room_id,
                status.local_user,
                status.state,
                if status.is_host { ", host" } else { "" }
            );
            println!("  host {host}, {} user(s)", status.users.len());
            println!(
                "  {video} {playing} at {}{}",
                format_time(status.playback.current_time),
                status
                    .playback
                    .duration
                    .map(|d| format!(" / {}", format_time(d)))
                    .unwrap_or_default()
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Leave => {
            conn.handle.leave();
            return Ok(false);
        }
    }
    Ok(true)
}
