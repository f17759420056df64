//! Port traits (interfaces) that use cases depend on.
//!
//! Adapters implement these traits; use cases never reference tungstenite,
//! reqwest, or a concrete player.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::event::{ClientEvent, RawEvent};
use crate::domain::identity::{RoomId, UserId, VideoId};
use crate::domain::playback::{PlaybackState, PlayerState, Volume};
use crate::domain::room::{EndReason, RoomDetails};

// ---------------------------------------------------------------------------
// Event channel (relay transport)
// ---------------------------------------------------------------------------

/// Identifies one `on` registration so it can be removed with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Where inbound events for a subscription are delivered.
pub type EventSink = mpsc::UnboundedSender<RawEvent>;

/// A persistent bidirectional event channel to the relay.
///
/// The connection is shared with other traffic (chat, queue); users only
/// subscribe to the names they consume.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Open the connection. No-op when already connected.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Close the connection. Subscribers receive a `disconnect` event.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    /// Send an event. Dropped without error when not connected; delivery is
    /// at most once.
    fn emit(&self, event: &ClientEvent);

    /// Deliver every inbound event named `event` to `sink`.
    fn on(&self, event: &str, sink: EventSink) -> SubscriptionId;

    /// Remove a registration made with [`EventChannel::on`].
    fn off(&self, id: SubscriptionId);
}

// ---------------------------------------------------------------------------
// EventCodec (serialization)
// ---------------------------------------------------------------------------

/// Encodes outbound events to frames and decodes inbound frames to
/// envelopes (e.g. JSON).
pub trait EventCodec: Send + Sync {
    fn encode(&self, event: &ClientEvent) -> anyhow::Result<String>;
    fn decode(&self, frame: &str) -> anyhow::Result<RawEvent>;
}

// ---------------------------------------------------------------------------
// Playback engine
// ---------------------------------------------------------------------------

/// Notifications a playback engine pushes toward the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerNotification {
    Ready,
    StateChanged(PlayerState),
}

pub type PlayerNotifier = mpsc::UnboundedSender<PlayerNotification>;

/// The embedded video player. Commands are fire-and-forget.
pub trait PlayerEngine: Send + Sync {
    fn load_video(&self, video: &VideoId);
    fn play(&self);
    fn pause(&self);
    fn seek_to(&self, time: f64, allow_seek_ahead: bool);
    fn current_time(&self) -> f64;
    /// `None` while the duration is unknown.
    fn duration(&self) -> Option<f64>;
    fn set_volume(&self, volume: Volume);
    fn mute(&self);
    fn unmute(&self);
}

// ---------------------------------------------------------------------------
// Room service (REST collaborator)
// ---------------------------------------------------------------------------

/// Room lifecycle and queue storage, owned by the remote service.
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn create_room(&self) -> anyhow::Result<RoomId>;

    /// Never fails for a missing room; returns `exists: false` instead.
    async fn get_room(&self, room_id: &RoomId) -> anyhow::Result<RoomDetails>;

    async fn add_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()>;

    async fn remove_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// App events (UI bridge)
// ---------------------------------------------------------------------------

/// Emits session changes toward whatever surface presents them.
pub trait AppEvents: Send + Sync {
    fn emit_users(&self, users: &[UserId]);
    fn emit_host(&self, host: Option<&UserId>, is_host: bool);
    fn emit_queue(&self, queue: &[VideoId], current_index: Option<usize>);
    fn emit_playback(&self, state: &PlaybackState);
    fn emit_session_ended(&self, reason: &EndReason);
}
