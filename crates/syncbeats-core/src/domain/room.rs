//! Room-level value types: REST room snapshot and session lifecycle.
//!
//! Pure data, no I/O.

use serde::{Deserialize, Serialize};

use super::event::PlaybackSnapshot;
use super::identity::{UserId, VideoId};

/// Room metadata returned by the room service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    pub exists: bool,
    #[serde(default)]
    pub host: Option<UserId>,
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default)]
    pub queue: Vec<VideoId>,
    #[serde(default)]
    pub current_index: Option<i64>,
    #[serde(default)]
    pub playback_state: Option<PlaybackSnapshot>,
}

/// Lifecycle of one room membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Joining,
    Synced,
}

/// Why a session went back to `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Left,
    Kicked,
    TransportLost,
    Rejected(String),
}
