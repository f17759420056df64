//! Room registry — the relay's authoritative room state.
//!
//! Every room keeps its roster, host, queue and last known playback
//! position. Socket events and REST calls both land here; the resulting
//! room events are pushed into the outboxes of the connections that joined.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use syncbeats_core::domain::event::{names, ClientEvent, PlaybackSnapshot, RawEvent};
use syncbeats_core::domain::identity::{RoomId, UserId, VideoId};
use syncbeats_core::domain::room::RoomDetails;

/// Frames waiting to be written to one socket.
pub type Outbox = mpsc::UnboundedSender<RawEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Video ID is required")]
    MissingVideoId,
    #[error("Video not found in queue")]
    VideoNotInQueue,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

struct Member {
    conn: ConnectionId,
    username: UserId,
    outbox: Outbox,
}

struct Room {
    host: Option<UserId>,
    users: Vec<UserId>,
    queue: Vec<VideoId>,
    current_index: usize,
    playback: PlaybackSnapshot,
    members: Vec<Member>,
}

impl Room {
    fn new() -> Self {
        Self {
            host: None,
            users: Vec::new(),
            queue: Vec::new(),
            current_index: 0,
            playback: PlaybackSnapshot {
                time: 0.0,
                playing: false,
            },
            members: Vec::new(),
        }
    }

    fn details(&self) -> RoomDetails {
        RoomDetails {
            exists: true,
            host: self.host.clone(),
            users: self.users.clone(),
            queue: self.queue.clone(),
            current_index: Some(self.current_index as i64),
            playback_state: Some(self.playback),
        }
    }

    fn broadcast(&self, event: &str, data: Value) {
        let raw = RawEvent::new(event, data);
        for member in &self.members {
            // A closed outbox belongs to a socket that is going away.
            let _ = member.outbox.send(raw.clone());
        }
    }

    fn broadcast_users(&self) {
        self.broadcast(names::USER_LIST, json!({ "users": self.users }));
    }

    fn broadcast_host(&self) {
        self.broadcast(names::HOST_UPDATE, json!({ "host": self.host }));
    }

    fn broadcast_queue(&self) {
        self.broadcast(
            names::QUEUE_UPDATE,
            json!({ "queue": self.queue, "currentIndex": self.current_index }),
        );
    }

    /// Drop `user` from the roster, handing host to the longest-present
    /// remaining user. Returns whether the user was present.
    fn remove_user(&mut self, user: &UserId) -> bool {
        let Some(pos) = self.users.iter().position(|u| u == user) else {
            return false;
        };
        self.users.remove(pos);
        if self.host.as_ref() == Some(user) {
            self.host = self.users.first().cloned();
            if self.host.is_some() {
                self.broadcast_host();
            }
        }
        self.broadcast_users();
        true
    }
}

fn send(outbox: &Outbox, event: &str, data: Value) {
    let _ = outbox.send(RawEvent::new(event, data));
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Room>>,
    next_connection: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id for a newly accepted socket.
    pub fn connect(&self) -> ConnectionId {
        ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    pub fn create_room(&self) -> RoomId {
        let mut rooms = self.lock();
        let mut room_id = RoomId::generate();
        while rooms.contains_key(&room_id) {
            room_id = RoomId::generate();
        }
        rooms.insert(room_id.clone(), Room::new());
        info!(%room_id, "Created room");
        room_id
    }

    /// Room metadata; `exists: false` for unknown rooms.
    pub fn details(&self, room_id: &RoomId) -> RoomDetails {
        self.lock()
            .get(room_id)
            .map(Room::details)
            .unwrap_or_default()
    }

    pub fn add_video(&self, room_id: &RoomId, video: VideoId) -> Result<(), RelayError> {
        let mut rooms = self.lock();
        let room = rooms.get_mut(room_id).ok_or(RelayError::RoomNotFound)?;
        if video.as_str().is_empty() {
            return Err(RelayError::MissingVideoId);
        }
        info!(%room_id, %video, "Queued video");
        room.queue.push(video);
        room.broadcast_queue();
        Ok(())
    }

    pub fn remove_video(&self, room_id: &RoomId, video: &VideoId) -> Result<(), RelayError> {
        let mut rooms = self.lock();
        let room = rooms.get_mut(room_id).ok_or(RelayError::RoomNotFound)?;
        let pos = room
            .queue
            .iter()
            .position(|v| v == video)
            .ok_or(RelayError::VideoNotInQueue)?;
        room.queue.remove(pos);
        if room.current_index >= room.queue.len() {
            room.current_index = room.queue.len().saturating_sub(1);
        }
        info!(%room_id, %video, "Removed video from queue");
        room.broadcast_queue();
        Ok(())
    }

    /// Apply one client event sent over socket `conn`.
    pub fn handle(&self, conn: ConnectionId, outbox: &Outbox, event: ClientEvent) {
        let mut rooms = self.lock();

        let room_id = match &event {
            ClientEvent::JoinRoom { room_id, .. }
            | ClientEvent::LeaveRoom { room_id, .. }
            | ClientEvent::Play { room_id }
            | ClientEvent::Pause { room_id }
            | ClientEvent::Seek { room_id, .. }
            | ClientEvent::Next { room_id }
            | ClientEvent::SyncRequest { room_id }
            | ClientEvent::KickUser { room_id, .. } => room_id.clone(),
        };
        let Some(room) = rooms.get_mut(&room_id) else {
            debug!(?conn, %room_id, event = event.name(), "event for unknown room");
            if matches!(event, ClientEvent::JoinRoom { .. }) {
                send(outbox, names::ERROR, json!({ "message": "Room not found" }));
            }
            return;
        };

        match event {
            ClientEvent::JoinRoom { username, .. } => {
                match room.members.iter_mut().find(|m| m.conn == conn) {
                    Some(member) => member.username = username.clone(),
                    None => room.members.push(Member {
                        conn,
                        username: username.clone(),
                        outbox: outbox.clone(),
                    }),
                }
                if !room.users.contains(&username) {
                    room.users.push(username.clone());
                }
                if room.host.is_none() {
                    room.host = Some(username.clone());
                }

                send(
                    outbox,
                    names::JOINED,
                    json!({ "roomId": room_id, "username": username }),
                );
                room.broadcast_users();
                room.broadcast_host();
                room.broadcast_queue();
                info!(%room_id, user = %username, host = ?room.host, "User joined");
            }

            ClientEvent::LeaveRoom { username, .. } => {
                if room.remove_user(&username) {
                    info!(%room_id, user = %username, "User left");
                }
                room.members.retain(|m| m.conn != conn);
            }

            ClientEvent::Play { .. } => {
                room.playback.playing = true;
                room.broadcast(names::PLAY, json!({}));
            }

            ClientEvent::Pause { .. } => {
                room.playback.playing = false;
                room.broadcast(names::PAUSE, json!({}));
            }

            ClientEvent::Seek { time, .. } => {
                room.playback.time = time;
                room.broadcast(names::SEEK, json!({ "time": time }));
            }

            ClientEvent::Next { .. } => {
                if room.current_index + 1 < room.queue.len() {
                    room.current_index += 1;
                    room.playback = PlaybackSnapshot {
                        time: 0.0,
                        playing: true,
                    };
                    room.broadcast_queue();
                    info!(%room_id, index = room.current_index, "Advanced queue");
                }
            }

            ClientEvent::SyncRequest { .. } => {
                send(
                    outbox,
                    names::SYNC_STATE,
                    json!({ "playbackState": room.playback }),
                );
            }

            ClientEvent::KickUser { username, host, .. } => {
                if room.host.as_ref() != Some(&host) {
                    debug!(%room_id, %host, "kick from non-host ignored");
                    return;
                }
                let Some(pos) = room.users.iter().position(|u| *u == username) else {
                    return;
                };
                room.users.remove(pos);
                room.broadcast_users();
                // Announced to the whole room; clients compare against the
                // roster they just received.
                room.broadcast(names::KICKED, json!({ "roomId": room_id }));
                info!(%room_id, %host, user = %username, "User kicked");
            }
        }
    }

    /// A socket closed. Users it joined who are still listed leave.
    pub fn disconnect(&self, conn: ConnectionId) {
        let mut rooms = self.lock();
        for (room_id, room) in rooms.iter_mut() {
            let Some(pos) = room.members.iter().position(|m| m.conn == conn) else {
                continue;
            };
            let member = room.members.remove(pos);
            let still_connected = room.members.iter().any(|m| m.username == member.username);
            if !still_connected && room.remove_user(&member.username) {
                info!(%room_id, user = %member.username, "User dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Socket {
        conn: ConnectionId,
        outbox: Outbox,
        inbox: UnboundedReceiver<RawEvent>,
    }

    impl Socket {
        fn open(rooms: &RoomRegistry) -> Self {
            let (outbox, inbox) = mpsc::unbounded_channel();
            Self {
                conn: rooms.connect(),
                outbox,
                inbox,
            }
        }

        fn send(&self, rooms: &RoomRegistry, event: ClientEvent) {
            rooms.handle(self.conn, &self.outbox, event);
        }

        fn drain(&mut self) -> Vec<RawEvent> {
            let mut out = Vec::new();
            while let Ok(raw) = self.inbox.try_recv() {
                out.push(raw);
            }
            out
        }

        fn names(&mut self) -> Vec<String> {
            self.drain().into_iter().map(|raw| raw.event).collect()
        }
    }

    fn join(rooms: &RoomRegistry, room_id: &RoomId, user: &str) -> Socket {
        let socket = Socket::open(rooms);
        socket.send(
            rooms,
            ClientEvent::JoinRoom {
                room_id: room_id.clone(),
                username: UserId::new(user),
            },
        );
        socket
    }

    #[test]
    fn joining_an_unknown_room_answers_error() {
        let rooms = RoomRegistry::new();
        let mut socket = join(&rooms, &RoomId::new("NOPE0000"), "bob");
        let frames = socket.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "error");
        assert_eq!(frames[0].data["message"], "Room not found");
    }

    #[test]
    fn first_joiner_hosts_and_everyone_gets_room_state() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        rooms.add_video(&room_id, VideoId::new("v1")).unwrap();

        let mut alice = join(&rooms, &room_id, "alice");
        assert_eq!(
            alice.names(),
            vec!["joined", "user_list", "host_update", "queue_update"]
        );

        let mut bob = join(&rooms, &room_id, "bob");
        let frames = bob.drain();
        assert_eq!(frames[1].data["users"], json!(["alice", "bob"]));
        assert_eq!(frames[2].data["host"], "alice");
        assert_eq!(frames[3].data, json!({"queue": ["v1"], "currentIndex": 0}));
        assert_eq!(alice.names(), vec!["user_list", "host_update", "queue_update"]);
    }

    #[test]
    fn next_advances_and_marks_room_playing() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        rooms.add_video(&room_id, VideoId::new("a")).unwrap();
        rooms.add_video(&room_id, VideoId::new("b")).unwrap();
        let mut alice = join(&rooms, &room_id, "alice");
        alice.drain();

        let next = ClientEvent::Next {
            room_id: room_id.clone(),
        };
        alice.send(&rooms, next.clone());
        let frames = alice.drain();
        assert_eq!(frames[0].data["currentIndex"], 1);
        let details = rooms.details(&room_id);
        assert_eq!(
            details.playback_state,
            Some(PlaybackSnapshot {
                time: 0.0,
                playing: true
            })
        );

        alice.send(&rooms, next);
        assert!(alice.drain().is_empty(), "already on the last video");
    }

    #[test]
    fn sync_request_answers_only_the_requester() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        let mut alice = join(&rooms, &room_id, "alice");
        let mut bob = join(&rooms, &room_id, "bob");
        alice.send(
            &rooms,
            ClientEvent::Seek {
                room_id: room_id.clone(),
                time: 30.0,
            },
        );
        alice.drain();
        bob.drain();

        bob.send(
            &rooms,
            ClientEvent::SyncRequest {
                room_id: room_id.clone(),
            },
        );
        assert!(alice.drain().is_empty());
        let frames = bob.drain();
        assert_eq!(frames[0].event, "sync_state");
        assert_eq!(
            frames[0].data,
            json!({"playbackState": {"time": 30.0, "playing": false}})
        );
    }

    #[test]
    fn kick_needs_the_host_and_is_announced_room_wide() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        let mut alice = join(&rooms, &room_id, "alice");
        let mut bob = join(&rooms, &room_id, "bob");
        alice.drain();
        bob.drain();

        bob.send(
            &rooms,
            ClientEvent::KickUser {
                room_id: room_id.clone(),
                username: UserId::new("alice"),
                host: UserId::new("bob"),
            },
        );
        assert!(alice.drain().is_empty());

        alice.send(
            &rooms,
            ClientEvent::KickUser {
                room_id: room_id.clone(),
                username: UserId::new("bob"),
                host: UserId::new("alice"),
            },
        );
        for socket in [&mut alice, &mut bob] {
            let frames = socket.drain();
            assert_eq!(frames[0].data["users"], json!(["alice"]));
            assert_eq!(frames[1].event, "kicked");
            assert_eq!(frames[1].data, json!({"roomId": room_id}));
        }
    }

    #[test]
    fn leaving_host_hands_over_to_next_user() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        let alice = join(&rooms, &room_id, "alice");
        let mut bob = join(&rooms, &room_id, "bob");
        bob.drain();

        alice.send(
            &rooms,
            ClientEvent::LeaveRoom {
                room_id: room_id.clone(),
                username: UserId::new("alice"),
            },
        );
        let frames = bob.drain();
        assert_eq!(frames[0].event, "host_update");
        assert_eq!(frames[0].data["host"], "bob");
        assert_eq!(frames[1].data["users"], json!(["bob"]));
        assert_eq!(rooms.details(&room_id).host, Some(UserId::new("bob")));
    }

    #[test]
    fn closed_socket_counts_as_leaving() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        let alice = join(&rooms, &room_id, "alice");
        let mut bob = join(&rooms, &room_id, "bob");
        bob.drain();

        rooms.disconnect(alice.conn);
        assert_eq!(bob.names(), vec!["host_update", "user_list"]);
        let details = rooms.details(&room_id);
        assert_eq!(details.users, vec![UserId::new("bob")]);
        assert_eq!(details.host, Some(UserId::new("bob")));
    }

    #[test]
    fn removing_videos_clamps_the_index() {
        let rooms = RoomRegistry::new();
        let room_id = rooms.create_room();
        for id in ["a", "b"] {
            rooms.add_video(&room_id, VideoId::new(id)).unwrap();
        }
        let alice = join(&rooms, &room_id, "alice");
        alice.send(
            &rooms,
            ClientEvent::Next {
                room_id: room_id.clone(),
            },
        );

        rooms.remove_video(&room_id, &VideoId::new("b")).unwrap();
        assert_eq!(rooms.details(&room_id).current_index, Some(0));
        assert_eq!(
            rooms.remove_video(&room_id, &VideoId::new("zzz")),
            Err(RelayError::VideoNotInQueue)
        );
        assert_eq!(
            rooms.add_video(&RoomId::new("NOPE0000"), VideoId::new("a")),
            Err(RelayError::RoomNotFound)
        );
        assert!(!rooms.details(&RoomId::new("NOPE0000")).exists);
    }
}
