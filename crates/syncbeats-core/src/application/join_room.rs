//! JoinRoom use case.
//!
//! Checks the room with the room service, then opens the event channel.
//! The relay-side join (`join_room` and the initial state) is driven by the
//! session once it has subscribed.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::domain::identity::RoomId;
use crate::domain::room::RoomDetails;
use crate::error::SyncError;

use super::ports::{EventChannel, RoomService};

/// Orchestrates entering (or creating) a room.
pub struct JoinRoomUseCase {
    rooms: Arc<dyn RoomService>,
    channel: Arc<dyn EventChannel>,
}

impl JoinRoomUseCase {
    pub fn new(rooms: Arc<dyn RoomService>, channel: Arc<dyn EventChannel>) -> Self {
        Self { rooms, channel }
    }

    /// Ask the room service for a fresh room.
    pub async fn create(&self) -> anyhow::Result<RoomId> {
        let room_id = self.rooms.create_room().await?;
        info!(%room_id, "Room created");
        Ok(room_id)
    }

    /// Execute the pre-join flow.
    ///
    /// 1. Fetch room details; a missing room is [`SyncError::RoomNotFound`].
    /// 2. Connect the event channel (no-op when already connected).
    ///
    /// Returns the details so the session can seed its initial position.
    pub async fn execute(&self, room_id: &RoomId) -> anyhow::Result<RoomDetails> {
        let details = self.rooms.get_room(room_id).await?;
        if !details.exists {
            return Err(SyncError::RoomNotFound(room_id.clone()).into());
        }
        info!(
            %room_id,
            host = ?details.host,
            users = details.users.len(),
            queued = details.queue.len(),
            "Room found"
        );

        self.channel
            .connect()
            .await
            .context("opening event channel")?;
        Ok(details)
    }
}
