//! Playback value types: player states, control kinds, local playback state.
//!
//! Pure data, no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Player state (translated at the player boundary)
// ---------------------------------------------------------------------------

/// State reported by the playback engine's state-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    VideoCued,
}

impl TryFrom<i32> for PlayerState {
    type Error = i32;

    /// Maps the embedded player's numeric state codes.
    fn try_from(code: i32) -> Result<Self, i32> {
        match code {
            -1 => Ok(Self::Unstarted),
            0 => Ok(Self::Ended),
            1 => Ok(Self::Playing),
            2 => Ok(Self::Paused),
            3 => Ok(Self::Buffering),
            5 => Ok(Self::VideoCued),
            other => Err(other),
        }
    }
}

impl From<PlayerState> for i32 {
    fn from(state: PlayerState) -> i32 {
        match state {
            PlayerState::Unstarted => -1,
            PlayerState::Ended => 0,
            PlayerState::Playing => 1,
            PlayerState::Paused => 2,
            PlayerState::Buffering => 3,
            PlayerState::VideoCued => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Control kinds (one suppression latch each)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Play,
    Pause,
    Seek,
}

impl ControlKind {
    pub const ALL: [ControlKind; 3] = [Self::Play, Self::Pause, Self::Seek];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Play => 0,
            Self::Pause => 1,
            Self::Seek => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Player volume, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);

    /// Clamps out-of-range input to `0..=100`.
    pub fn new(level: u32) -> Self {
        Self(level.min(100) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_silent(self) -> bool {
        self.0 == 0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// The local view of playback, owned by one sync engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub playing: bool,
    /// Seconds, never negative.
    pub current_time: f64,
    /// Seconds; `None` until the engine reports a duration.
    pub duration: Option<f64>,
    pub volume: Volume,
    pub muted: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            playing: false,
            current_time: 0.0,
            duration: None,
            volume: Volume::default(),
            muted: false,
        }
    }
}

/// Normalise a time reported by a player or a peer. Non-finite or negative
/// values are rejected.
pub fn valid_time(time: f64) -> Option<f64> {
    (time.is_finite() && time >= 0.0).then_some(time)
}
