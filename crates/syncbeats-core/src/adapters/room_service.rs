//! In-memory [`RoomService`] adapter, for offline use and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::application::ports::RoomService;
use crate::domain::event::PlaybackSnapshot;
use crate::domain::identity::{RoomId, VideoId};
use crate::domain::room::RoomDetails;

/// Rooms held in process. Only the queue is mutated here; membership and
/// playback belong to the relay.
#[derive(Default)]
pub struct InMemoryRoomService {
    rooms: Mutex<HashMap<RoomId, RoomDetails>>,
}

impl InMemoryRoomService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a room with the given details under `room_id`.
    pub fn insert(&self, room_id: RoomId, details: RoomDetails) {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room_id, RoomDetails { exists: true, ..details });
    }
}

#[async_trait]
impl RoomService for InMemoryRoomService {
    async fn create_room(&self) -> anyhow::Result<RoomId> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let mut room_id = RoomId::generate();
        while rooms.contains_key(&room_id) {
            room_id = RoomId::generate();
        }
        rooms.insert(
            room_id.clone(),
            RoomDetails {
                exists: true,
                current_index: Some(0),
                playback_state: Some(PlaybackSnapshot {
                    time: 0.0,
                    playing: false,
                }),
                ..RoomDetails::default()
            },
        );
        Ok(room_id)
    }

    async fn get_room(&self, room_id: &RoomId) -> anyhow::Result<RoomDetails> {
        Ok(self
            .rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| anyhow::anyhow!("room {room_id} not found"))?;
        room.queue.push(video.clone());
        Ok(())
    }

    async fn remove_video(&self, room_id: &RoomId, video: &VideoId) -> anyhow::Result<()> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| anyhow::anyhow!("room {room_id} not found"))?;
        let position = room
            .queue
            .iter()
            .position(|v| v == video)
            .ok_or_else(|| anyhow::anyhow!("{video} is not queued in room {room_id}"))?;
        room.queue.remove(position);

        let len = room.queue.len() as i64;
        if room.current_index.unwrap_or(0) >= len {
            room.current_index = Some((len - 1).max(0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removing_keeps_index_in_range() {
        let rooms = InMemoryRoomService::new();
        let room_id = rooms.create_room().await.unwrap();
        for id in ["a", "b"] {
            rooms.add_video(&room_id, &VideoId::new(id)).await.unwrap();
        }
        rooms.insert(
            room_id.clone(),
            RoomDetails {
                current_index: Some(1),
                ..rooms.get_room(&room_id).await.unwrap()
            },
        );

        rooms.remove_video(&room_id, &VideoId::new("b")).await.unwrap();
        let details = rooms.get_room(&room_id).await.unwrap();
        assert_eq!(details.queue, vec![VideoId::new("a")]);
        assert_eq!(details.current_index, Some(0));
    }

    #[tokio::test]
    async fn unknown_room_reads_as_missing() {
        let rooms = InMemoryRoomService::new();
        assert!(!rooms.get_room(&RoomId::new("NOPE")).await.unwrap().exists);
        assert!(rooms
            .add_video(&RoomId::new("NOPE"), &VideoId::new("a"))
            .await
            .is_err());
    }
}
