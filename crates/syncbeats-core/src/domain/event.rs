//! Protocol event types exchanged with the relay.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": {...}}`.
//! Pure data, no I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::{RoomId, UserId, VideoId};
use super::playback::valid_time;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod names {
    pub const JOIN_ROOM: &str = "join_room";
    pub const LEAVE_ROOM: &str = "leave_room";
    pub const JOINED: &str = "joined";
    pub const USER_LIST: &str = "user_list";
    pub const HOST_UPDATE: &str = "host_update";
    pub const QUEUE_UPDATE: &str = "queue_update";
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const SEEK: &str = "seek";
    pub const NEXT: &str = "next";
    pub const SYNC_REQUEST: &str = "sync_request";
    pub const SYNC_STATE: &str = "sync_state";
    pub const KICK_USER: &str = "kick_user";
    pub const KICKED: &str = "kicked";
    pub const ERROR: &str = "error";
    /// Synthesised locally by channel adapters when the connection drops.
    pub const DISCONNECT: &str = "disconnect";

    /// Inbound names the sync session subscribes to.
    pub const SESSION_INBOUND: &[&str] = &[
        JOINED,
        USER_LIST,
        HOST_UPDATE,
        QUEUE_UPDATE,
        PLAY,
        PAUSE,
        SEEK,
        SYNC_STATE,
        KICKED,
        ERROR,
        DISCONNECT,
    ];
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An undecoded event as it travels on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom { room_id: RoomId, username: UserId },
    LeaveRoom { room_id: RoomId, username: UserId },
    Play { room_id: RoomId },
    Pause { room_id: RoomId },
    Seek { room_id: RoomId, time: f64 },
    Next { room_id: RoomId },
    SyncRequest { room_id: RoomId },
    KickUser {
        room_id: RoomId,
        username: UserId,
        host: UserId,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => names::JOIN_ROOM,
            Self::LeaveRoom { .. } => names::LEAVE_ROOM,
            Self::Play { .. } => names::PLAY,
            Self::Pause { .. } => names::PAUSE,
            Self::Seek { .. } => names::SEEK,
            Self::Next { .. } => names::NEXT,
            Self::SyncRequest { .. } => names::SYNC_REQUEST,
            Self::KickUser { .. } => names::KICK_USER,
        }
    }

    /// Events only the room host may originate.
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Self::Play { .. }
                | Self::Pause { .. }
                | Self::Seek { .. }
                | Self::Next { .. }
                | Self::KickUser { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Playback snapshot as kept by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub time: f64,
    pub playing: bool,
}

/// Events the relay delivers to this client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Joined {
        room_id: RoomId,
        username: UserId,
    },
    UserList {
        users: Vec<UserId>,
    },
    HostUpdate {
        host: Option<UserId>,
    },
    QueueUpdate {
        queue: Vec<VideoId>,
        /// Raw index as sent; the queue coordinator clamps it.
        current_index: Option<i64>,
    },
    Play,
    Pause,
    Seek {
        time: f64,
    },
    SyncState(PlaybackSnapshot),
    Kicked {
        room_id: Option<RoomId>,
        username: Option<UserId>,
    },
    Error {
        message: String,
    },
    /// The transport connection went away.
    Disconnected,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinedPayload {
    room_id: RoomId,
    username: UserId,
}

#[derive(Deserialize)]
struct UserListPayload {
    users: Vec<UserId>,
}

#[derive(Deserialize)]
struct HostUpdatePayload {
    host: Option<UserId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueUpdatePayload {
    queue: Vec<VideoId>,
    #[serde(default)]
    current_index: Option<i64>,
}

#[derive(Deserialize)]
struct SeekPayload {
    time: f64,
}

/// `sync_state` arrives either flat or wrapped in `playbackState`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SyncStatePayload {
    Wrapped {
        #[serde(rename = "playbackState")]
        playback_state: PlaybackSnapshot,
    },
    Flat(PlaybackSnapshot),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct KickedPayload {
    #[serde(default)]
    room_id: Option<RoomId>,
    #[serde(default)]
    username: Option<UserId>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

fn payload<T: for<'de> Deserialize<'de>>(raw: &RawEvent) -> Result<T, EventDecodeError> {
    serde_json::from_value(raw.data.clone()).map_err(|source| EventDecodeError::Malformed {
        event: raw.event.clone(),
        source,
    })
}

fn checked_time(event: &str, time: f64) -> Result<f64, EventDecodeError> {
    valid_time(time).ok_or_else(|| EventDecodeError::InvalidTime {
        event: event.to_string(),
        time,
    })
}

impl ServerEvent {
    /// Decode a raw envelope into a typed event.
    pub fn decode(raw: &RawEvent) -> Result<Self, EventDecodeError> {
        let event = match raw.event.as_str() {
            names::JOINED => {
                let p: JoinedPayload = payload(raw)?;
                Self::Joined {
                    room_id: p.room_id,
                    username: p.username,
                }
            }
            names::USER_LIST => Self::UserList {
                users: payload::<UserListPayload>(raw)?.users,
            },
            names::HOST_UPDATE => Self::HostUpdate {
                host: payload::<HostUpdatePayload>(raw)?.host,
            },
            names::QUEUE_UPDATE => {
                let p: QueueUpdatePayload = payload(raw)?;
                Self::QueueUpdate {
                    queue: p.queue,
                    current_index: p.current_index,
                }
            }
            names::PLAY => Self::Play,
            names::PAUSE => Self::Pause,
            names::SEEK => Self::Seek {
                time: checked_time(&raw.event, payload::<SeekPayload>(raw)?.time)?,
            },
            names::SYNC_STATE => {
                let snapshot = match payload::<SyncStatePayload>(raw)? {
                    SyncStatePayload::Wrapped { playback_state } => playback_state,
                    SyncStatePayload::Flat(snapshot) => snapshot,
                };
                Self::SyncState(PlaybackSnapshot {
                    time: checked_time(&raw.event, snapshot.time)?,
                    playing: snapshot.playing,
                })
            }
            names::KICKED => {
                let p: KickedPayload = if raw.data.is_null() {
                    KickedPayload::default()
                } else {
                    payload(raw)?
                };
                Self::Kicked {
                    room_id: p.room_id,
                    username: p.username,
                }
            }
            names::ERROR => Self::Error {
                message: payload::<ErrorPayload>(raw)?.message,
            },
            names::DISCONNECT => Self::Disconnected,
            other => return Err(EventDecodeError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("malformed `{event}` payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{event}` carries invalid time {time}")]
    InvalidTime { event: String, time: f64 },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn outbound_envelope_uses_event_and_camel_case_data() {
        let ev = ClientEvent::Seek {
            room_id: RoomId::new("ABCD1234"),
            time: 42.5,
        };
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            value,
            json!({"event": "seek", "data": {"roomId": "ABCD1234", "time": 42.5}})
        );
        assert_eq!(ev.name(), "seek");
    }

    #[test]
    fn relay_reads_client_frames() {
        let ev: ClientEvent = serde_json::from_str(
            r#"{"event": "join_room", "data": {"roomId": "R", "username": "bob"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ClientEvent::JoinRoom {
                room_id: RoomId::new("R"),
                username: UserId::new("bob"),
            }
        );
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event": "seek", "data": {"roomId": "R"}}"#).is_err());
    }

    #[test]
    fn kick_user_carries_host() {
        let ev = ClientEvent::KickUser {
            room_id: RoomId::new("R"),
            username: UserId::new("bob"),
            host: UserId::new("alice"),
        };
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["event"], "kick_user");
        assert_eq!(value["data"]["host"], "alice");
        assert!(ev.is_host_only());
        assert!(!ClientEvent::SyncRequest { room_id: RoomId::new("R") }.is_host_only());
    }

    #[test]
    fn decodes_queue_update_without_index() {
        let raw = RawEvent::new("queue_update", json!({"queue": []}));
        assert_eq!(
            ServerEvent::decode(&raw).unwrap(),
            ServerEvent::QueueUpdate {
                queue: vec![],
                current_index: None
            }
        );
    }

    #[test]
    fn decodes_both_sync_state_shapes() {
        let flat = RawEvent::new("sync_state", json!({"time": 12.0, "playing": true}));
        let wrapped = RawEvent::new(
            "sync_state",
            json!({"playbackState": {"time": 12.0, "playing": true}}),
        );
        let expected = ServerEvent::SyncState(PlaybackSnapshot {
            time: 12.0,
            playing: true,
        });
        assert_eq!(ServerEvent::decode(&flat).unwrap(), expected);
        assert_eq!(ServerEvent::decode(&wrapped).unwrap(), expected);
    }

    #[test]
    fn play_tolerates_missing_data() {
        let raw: RawEvent = serde_json::from_str(r#"{"event":"play"}"#).unwrap();
        assert_eq!(ServerEvent::decode(&raw).unwrap(), ServerEvent::Play);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        let bad_seek = RawEvent::new("seek", json!({"time": "soon"}));
        assert!(matches!(
            ServerEvent::decode(&bad_seek),
            Err(EventDecodeError::Malformed { .. })
        ));

        let negative = RawEvent::new("seek", json!({"time": -3.0}));
        assert!(matches!(
            ServerEvent::decode(&negative),
            Err(EventDecodeError::InvalidTime { .. })
        ));

        let unknown = RawEvent::new("chat_message", json!({}));
        assert!(matches!(
            ServerEvent::decode(&unknown),
            Err(EventDecodeError::UnknownEvent(_))
        ));
    }

    #[test]
    fn kicked_accepts_scoped_and_bare_payloads() {
        let bare = RawEvent::new("kicked", Value::Null);
        assert_eq!(
            ServerEvent::decode(&bare).unwrap(),
            ServerEvent::Kicked {
                room_id: None,
                username: None
            }
        );
        let scoped = RawEvent::new("kicked", json!({"roomId": "R1", "username": "bob"}));
        assert_eq!(
            ServerEvent::decode(&scoped).unwrap(),
            ServerEvent::Kicked {
                room_id: Some(RoomId::new("R1")),
                username: Some(UserId::new("bob"))
            }
        );
    }
}
