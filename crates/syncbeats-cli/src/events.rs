//! TerminalAppEvents — implements the [`AppEvents`] port by printing to
//! stdout.

use syncbeats_core::application::ports::AppEvents;
use syncbeats_core::domain::identity::{UserId, VideoId};
use syncbeats_core::domain::playback::PlaybackState;
use syncbeats_core::domain::room::EndReason;

/// Bridges application-layer events to the terminal.
#[derive(Clone, Default)]
pub struct TerminalAppEvents;

impl TerminalAppEvents {
    pub fn new() -> Self {
        Self
    }
}

pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

impl AppEvents for TerminalAppEvents {
    fn emit_users(&self, users: &[UserId]) {
        let names: Vec<&str> = users.iter().map(UserId::as_str).collect();
        println!("* users ({}): {}", users.len(), names.join(", "));
    }

    fn emit_host(&self, host: Option<&UserId>, is_host: bool) {
        match host {
            Some(_) if is_host => println!("* you are the host"),
            Some(host) => println!("* host: {host}"),
            None => println!("* room has no host"),
        }
    }

    fn emit_queue(&self, queue: &[VideoId], current_index: Option<usize>) {
        if queue.is_empty() {
            println!("* queue is empty");
            return;
        }
        println!("* queue:");
        for (i, video) in queue.iter().enumerate() {
            let marker = if Some(i) == current_index { ">" } else { " " };
            println!("  {marker} {}. {video}", i + 1);
        }
    }

    fn emit_playback(&self, state: &PlaybackState) {
        let status = if state.playing { "playing" } else { "paused" };
        let volume = if state.muted {
            "muted".to_string()
        } else {
            format!("vol {}", state.volume.get())
        };
        println!("* {status} at {} ({volume})", format_time(state.current_time));
    }

    fn emit_session_ended(&self, reason: &EndReason) {
        match reason {
            EndReason::Left => println!("* left the room"),
            EndReason::Kicked => println!("* you were removed from the room by the host"),
            EndReason::TransportLost => println!("* lost connection to the relay"),
            EndReason::Rejected(message) => println!("* could not join: {message}"),
        }
    }
}
